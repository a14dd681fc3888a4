use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::CustomerId;
use domain::{Category, ExpertiseLevel, Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Catalog filters.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub category: Option<Category>,
    pub expertise: Option<ExpertiseLevel>,
    /// Case-insensitive match on title or author.
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl BookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn expertise(mut self, expertise: ExpertiseLevel) -> Self {
        self.expertise = Some(expertise);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Lowercased search needle, blank searches ignored.
    pub(crate) fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Ordering of order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    DateAsc,
    #[default]
    DateDesc,
    AmountAsc,
    AmountDesc,
}

impl OrderSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSort::DateAsc => "date_asc",
            OrderSort::DateDesc => "date_desc",
            OrderSort::AmountAsc => "amount_asc",
            OrderSort::AmountDesc => "amount_desc",
        }
    }

    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            OrderSort::DateAsc => "created_at ASC, id ASC",
            OrderSort::DateDesc => "created_at DESC, id DESC",
            OrderSort::AmountAsc => "total_cents ASC, created_at DESC",
            OrderSort::AmountDesc => "total_cents DESC, created_at DESC",
        }
    }

    pub(crate) fn sort(&self, orders: &mut [Order]) {
        match self {
            OrderSort::DateAsc => orders.sort_by(|a, b| {
                a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
            }),
            OrderSort::DateDesc => orders.sort_by(|a, b| {
                b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
            }),
            OrderSort::AmountAsc => orders.sort_by(|a, b| {
                a.total.cmp(&b.total).then(b.created_at.cmp(&a.created_at))
            }),
            OrderSort::AmountDesc => orders.sort_by(|a, b| {
                b.total.cmp(&a.total).then(b.created_at.cmp(&a.created_at))
            }),
        }
    }
}

impl FromStr for OrderSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date_asc" => Ok(OrderSort::DateAsc),
            "date_desc" => Ok(OrderSort::DateDesc),
            "amount_asc" => Ok(OrderSort::AmountAsc),
            "amount_desc" => Ok(OrderSort::AmountDesc),
            other => Err(format!("Unknown sort: {other}")),
        }
    }
}

/// Order listing filters and pagination.
///
/// Pages are 1-based. A page of zero is treated as the first page and a
/// limit of zero as the default limit.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    /// Placed at or after.
    pub from: Option<DateTime<Utc>>,
    /// Placed at or before.
    pub to: Option<DateTime<Utc>>,
    pub sort: OrderSort,
    pub page: u32,
    pub limit: u32,
}

impl OrderQuery {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Orders placed by one customer.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn sort(mut self, sort: OrderSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub(crate) fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub(crate) fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        u64::from(self.effective_page() - 1) * u64::from(self.effective_limit())
    }

    pub(crate) fn matches(&self, order: &Order) -> bool {
        self.customer_id.is_none_or(|c| order.customer_id == Some(c))
            && self.status.is_none_or(|s| order.status == s)
            && self.from.is_none_or(|from| order.created_at >= from)
            && self.to.is_none_or(|to| order.created_at <= to)
    }

    pub(crate) fn page_of(&self, orders: Vec<Order>, total: u64) -> OrderPage {
        let limit = u64::from(self.effective_limit());
        OrderPage {
            orders,
            page: self.effective_page(),
            pages: u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX),
            total,
        }
    }
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            customer_id: None,
            status: None,
            from: None,
            to: None,
            sort: OrderSort::default(),
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of an order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parses_wire_names() {
        for sort in [
            OrderSort::DateAsc,
            OrderSort::DateDesc,
            OrderSort::AmountAsc,
            OrderSort::AmountDesc,
        ] {
            assert_eq!(sort.as_str().parse::<OrderSort>().unwrap(), sort);
        }
        assert!("price".parse::<OrderSort>().is_err());
        assert_eq!(OrderSort::default(), OrderSort::DateDesc);
    }

    #[test]
    fn test_order_query_defaults_and_offset() {
        let query = OrderQuery::new();
        assert_eq!(query.effective_page(), 1);
        assert_eq!(query.effective_limit(), 10);
        assert_eq!(query.offset(), 0);

        let query = OrderQuery::new().page(3).limit(25);
        assert_eq!(query.offset(), 50);

        let query = OrderQuery::new().page(0).limit(0);
        assert_eq!(query.effective_page(), 1);
        assert_eq!(query.effective_limit(), 10);
    }

    #[test]
    fn test_page_count_rounds_up() {
        let query = OrderQuery::new().limit(10);
        assert_eq!(query.page_of(Vec::new(), 0).pages, 0);
        assert_eq!(query.page_of(Vec::new(), 10).pages, 1);
        assert_eq!(query.page_of(Vec::new(), 11).pages, 2);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert_eq!(BookQuery::new().search("  ").needle(), None);
        assert_eq!(
            BookQuery::new().search(" Pasta ").needle().as_deref(),
            Some("pasta")
        );
    }
}
