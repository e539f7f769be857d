use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Serialize;
use time::{macros::format_description, Date};

use crate::{
    error::AppError,
    validator::{permitted_value, Validator},
};

const MAX_PAGE: i64 = 10_000_000;
const MAX_PAGE_SIZE: i64 = 100;

/// A sortable column of one resource.
///
/// `SAFELIST` is the exact set of accepted `sort` values; a leading `-` marks
/// descending order. Keys resolve to variants, and variants to `'static`
/// column names, so nothing from the request ever reaches the SQL text.
pub trait SortKey: Copy + Send + Sync + 'static {
    const SAFELIST: &'static [&'static str];
    const DEFAULT_SORT: &'static str;
    const DEFAULT_PAGE_SIZE: i64;
    /// Primary key variant; its column breaks ties in ascending order.
    const PRIMARY: Self;

    fn from_key(key: &str) -> Option<Self>;
    fn column(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Page, page size and resolved sort for one list request.
#[derive(Debug, Clone, Copy)]
pub struct Filters<S> {
    pub page: i64,
    pub page_size: i64,
    pub sort: S,
    pub direction: SortDirection,
}

impl<S: SortKey> Filters<S> {
    /// Reads `page`, `page_size` and `sort` from the query string, recording
    /// every problem in `v`. The returned value is only meaningful when `v`
    /// is still valid.
    pub fn from_query(query: &QueryParams, v: &mut Validator) -> Self {
        let page = query.int("page", 1, v);
        let page_size = query.int("page_size", S::DEFAULT_PAGE_SIZE, v);
        let sort = query.string("sort", S::DEFAULT_SORT);
        Self::new(page, page_size, &sort, v)
    }

    pub fn new(page: i64, page_size: i64, sort: &str, v: &mut Validator) -> Self {
        v.check(page > 0, "page", "must be greater than zero");
        v.check(page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(page_size > 0, "page_size", "must be greater than zero");
        v.check(page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");

        let resolved = if permitted_value(&sort, S::SAFELIST) {
            resolve::<S>(sort)
        } else {
            None
        };
        let (sort, direction) = match resolved {
            Some(pair) => pair,
            None => {
                v.add_error("sort", "invalid sort value");
                resolve::<S>(S::DEFAULT_SORT).unwrap_or((S::PRIMARY, SortDirection::Asc))
            }
        };

        Self {
            page,
            page_size,
            sort,
            direction,
        }
    }

    pub fn sort_column(&self) -> &'static str {
        self.sort.column()
    }

    pub fn sort_direction(&self) -> &'static str {
        self.direction.as_sql()
    }

    /// `ORDER BY` body: the requested column, then the primary key ascending.
    pub fn order_by(&self) -> String {
        format!(
            "{} {}, {} ASC",
            self.sort_column(),
            self.sort_direction(),
            S::PRIMARY.column()
        )
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

fn resolve<S: SortKey>(key: &str) -> Option<(S, SortDirection)> {
    match key.strip_prefix('-') {
        Some(column) => S::from_key(column).map(|s| (s, SortDirection::Desc)),
        None => S::from_key(key).map(|s| (s, SortDirection::Asc)),
    }
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    /// All zero when there is nothing to page through.
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records <= 0 || page_size <= 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

/// Raw query string parameters with typed, validating accessors.
#[derive(Debug, Default, Clone)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn string(&self, key: &str, default: &str) -> String {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => match value.parse::<i64>() {
                Ok(n) => n,
                Err(_) => {
                    v.add_error(key, "must be an integer value");
                    default
                }
            },
            _ => default,
        }
    }

    pub fn bool(&self, key: &str, v: &mut Validator) -> Option<bool> {
        match self.0.get(key).map(String::as_str) {
            None | Some("") => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(_) => {
                v.add_error(key, "must be 'true' or 'false'");
                None
            }
        }
    }

    pub fn date(&self, key: &str, v: &mut Validator) -> Option<Date> {
        let format = format_description!("[year]-[month]-[day]");
        match self.0.get(key) {
            Some(value) if !value.is_empty() => match Date::parse(value, format) {
                Ok(date) => Some(date),
                Err(_) => {
                    v.add_error(key, "invalid date format");
                    None
                }
            },
            _ => None,
        }
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        Self(pairs.into_iter().collect())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(map) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestSort {
        Id,
        Name,
    }

    impl SortKey for TestSort {
        const SAFELIST: &'static [&'static str] = &["id", "name", "-id", "-name"];
        const DEFAULT_SORT: &'static str = "id";
        const DEFAULT_PAGE_SIZE: i64 = 15;
        const PRIMARY: Self = Self::Id;

        fn from_key(key: &str) -> Option<Self> {
            match key {
                "id" => Some(Self::Id),
                "name" => Some(Self::Name),
                _ => None,
            }
        }

        fn column(self) -> &'static str {
            match self {
                Self::Id => "test_id",
                Self::Name => "name",
            }
        }
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(pairs: &[(&str, &str)]) -> (Filters<TestSort>, Validator) {
        let query = params(pairs);
        let mut v = Validator::new();
        let filters = Filters::<TestSort>::from_query(&query, &mut v);
        (filters, v)
    }

    #[test]
    fn defaults_apply_when_absent() {
        let (f, v) = parse(&[]);
        assert!(v.valid());
        assert_eq!(f.page, 1);
        assert_eq!(f.page_size, 15);
        assert_eq!(f.sort, TestSort::Id);
        assert_eq!(f.direction, SortDirection::Asc);
    }

    #[test]
    fn descending_prefix_is_stripped() {
        let (f, v) = parse(&[("sort", "-name")]);
        assert!(v.valid());
        assert_eq!(f.sort_column(), "name");
        assert_eq!(f.sort_direction(), "DESC");
        assert_eq!(f.order_by(), "name DESC, test_id ASC");
    }

    #[test]
    fn key_maps_to_column_name() {
        let (f, _) = parse(&[("sort", "id")]);
        assert_eq!(f.sort_column(), "test_id");
        assert_eq!(f.sort_direction(), "ASC");
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        let (_, v) = parse(&[("sort", "name; DROP TABLE users")]);
        assert_eq!(v.errors()["sort"], "invalid sort value");
    }

    #[test]
    fn resolvable_key_outside_safelist_is_rejected() {
        let query = params(&[("sort", "--id")]);
        let mut v = Validator::new();
        let _ = Filters::<TestSort>::from_query(&query, &mut v);
        assert_eq!(v.errors()["sort"], "invalid sort value");
    }

    #[test]
    fn non_integer_page_is_a_field_error() {
        let (_, v) = parse(&[("page", "notint")]);
        assert_eq!(v.errors()["page"], "must be an integer value");
    }

    #[test]
    fn page_and_page_size_bounds() {
        let (_, v) = parse(&[("page", "0"), ("page_size", "101")]);
        assert_eq!(v.errors()["page"], "must be greater than zero");
        assert_eq!(v.errors()["page_size"], "must be a maximum of 100");

        let (_, v) = parse(&[("page", "10000001"), ("page_size", "0")]);
        assert_eq!(v.errors()["page"], "must be a maximum of 10 million");
        assert_eq!(v.errors()["page_size"], "must be greater than zero");
    }

    #[test]
    fn offset_follows_page_arithmetic() {
        for page in [1_i64, 2, 7, 500] {
            for page_size in [1_i64, 15, 20, 100] {
                let mut v = Validator::new();
                let f = Filters::<TestSort>::new(page, page_size, "id", &mut v);
                assert!(v.valid());
                assert_eq!(f.limit(), page_size);
                assert_eq!(f.offset(), (page - 1) * page_size);
            }
        }
    }

    #[test]
    fn metadata_for_empty_result_is_zeroed() {
        assert_eq!(Metadata::calculate(0, 3, 20), Metadata::default());
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        let m = Metadata::calculate(41, 2, 20);
        assert_eq!(m.current_page, 2);
        assert_eq!(m.page_size, 20);
        assert_eq!(m.first_page, 1);
        assert_eq!(m.last_page, 3);
        assert_eq!(m.total_records, 41);
        assert_eq!(Metadata::calculate(40, 1, 20).last_page, 2);
    }

    #[test]
    fn bool_and_date_parameters() {
        let query = params(&[
            ("done", "true"),
            ("open", "false"),
            ("bad", "yes"),
            ("when", "2025-01-31"),
            ("never", "31/01/2025"),
        ]);
        let mut v = Validator::new();
        assert_eq!(query.bool("done", &mut v), Some(true));
        assert_eq!(query.bool("open", &mut v), Some(false));
        assert_eq!(query.bool("missing", &mut v), None);
        assert_eq!(query.bool("bad", &mut v), None);
        assert!(query.date("when", &mut v).is_some());
        assert!(query.date("never", &mut v).is_none());
        assert_eq!(v.errors()["bad"], "must be 'true' or 'false'");
        assert_eq!(v.errors()["never"], "invalid date format");
    }
}
