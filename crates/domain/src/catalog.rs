//! Catalog entries.

use chrono::{DateTime, Utc};
use common::BookId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Cuisine a cookbook covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    French,
    Italian,
    Asian,
    Vegetarian,
    Pastry,
    Wine,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::French => "FRENCH",
            Category::Italian => "ITALIAN",
            Category::Asian => "ASIAN",
            Category::Vegetarian => "VEGETARIAN",
            Category::Pastry => "PASTRY",
            Category::Wine => "WINE",
            Category::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRENCH" => Ok(Category::French),
            "ITALIAN" => Ok(Category::Italian),
            "ASIAN" => Ok(Category::Asian),
            "VEGETARIAN" => Ok(Category::Vegetarian),
            "PASTRY" => Ok(Category::Pastry),
            "WINE" => Ok(Category::Wine),
            "OTHER" => Ok(Category::Other),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Cooking skill a cookbook targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl ExpertiseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertiseLevel::Beginner => "BEGINNER",
            ExpertiseLevel::Intermediate => "INTERMEDIATE",
            ExpertiseLevel::Expert => "EXPERT",
        }
    }
}

impl std::str::FromStr for ExpertiseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEGINNER" => Ok(ExpertiseLevel::Beginner),
            "INTERMEDIATE" => Ok(ExpertiseLevel::Intermediate),
            "EXPERT" => Ok(ExpertiseLevel::Expert),
            other => Err(format!("unknown expertise level: {other}")),
        }
    }
}

/// A book in the catalog.
///
/// `stock` is the quantity still available for new reservations; units held
/// by carts have already been taken out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: Money,
    pub stock: u32,
    pub category: Category,
    pub expertise: ExpertiseLevel,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Returns true if `quantity` units can be taken from stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// Builds the rejection for a request this book cannot cover.
    pub fn insufficient(&self, requested: u32, available: u32) -> DomainError {
        DomainError::InsufficientStock {
            book_id: self.id,
            title: self.title.clone(),
            requested,
            available,
        }
    }
}

/// Catalog entry submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub price: Money,
    pub stock: u32,
    pub category: Category,
    pub expertise: ExpertiseLevel,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewBook {
    /// Validates the entry and assigns it an id.
    pub fn into_book(self) -> Result<Book, DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvalidBook {
                reason: "title is required".to_string(),
            });
        }
        if self.author.trim().is_empty() {
            return Err(DomainError::InvalidBook {
                reason: "author is required".to_string(),
            });
        }
        if self.price.is_negative() {
            return Err(DomainError::InvalidBook {
                reason: format!("price must not be negative, got {}", self.price),
            });
        }

        Ok(Book {
            id: BookId::new(),
            title: self.title,
            author: self.author,
            price: self.price,
            stock: self.stock,
            category: self.category,
            expertise: self.expertise,
            description: self.description,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book() -> NewBook {
        NewBook {
            title: "Le Guide Culinaire".to_string(),
            author: "Auguste Escoffier".to_string(),
            price: Money::from_cents(4500),
            stock: 3,
            category: Category::French,
            expertise: ExpertiseLevel::Expert,
            description: None,
        }
    }

    #[test]
    fn test_into_book_assigns_id() {
        let book = new_book().into_book().unwrap();
        assert_eq!(book.title, "Le Guide Culinaire");
        assert_eq!(book.stock, 3);
        assert!(book.has_stock_for(3));
        assert!(!book.has_stock_for(4));
    }

    #[test]
    fn test_into_book_rejects_blank_title() {
        let mut entry = new_book();
        entry.title = "  ".to_string();
        assert!(matches!(
            entry.into_book(),
            Err(DomainError::InvalidBook { .. })
        ));
    }

    #[test]
    fn test_into_book_rejects_negative_price() {
        let mut entry = new_book();
        entry.price = Money::from_cents(-1);
        assert!(entry.into_book().is_err());
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(Category::Pastry.as_str(), "PASTRY");
        assert_eq!("WINE".parse::<Category>().unwrap(), Category::Wine);
        assert_eq!(
            "INTERMEDIATE".parse::<ExpertiseLevel>().unwrap(),
            ExpertiseLevel::Intermediate
        );
        assert!("SPICY".parse::<Category>().is_err());
        assert_eq!(
            serde_json::to_string(&ExpertiseLevel::Beginner).unwrap(),
            "\"BEGINNER\""
        );
    }
}
