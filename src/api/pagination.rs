use serde::Serialize;

use crate::api::error::ApiError;

const PAGE_PARAM: &str = "page";

/// Page-number pagination envelope
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Page selection for one request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Parse the raw `page` parameter. Absent or empty selects the first page.
    /// A page whose offset does not fit in `usize` can never hold rows.
    pub fn request(&self, raw: Option<&str>) -> Result<PageRequest, ApiError> {
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(text) => match text.parse::<usize>() {
                Ok(number) if number >= 1 => number,
                _ => return Err(ApiError::InvalidPage),
            },
        };

        let page = PageRequest {
            number,
            size: self.page_size,
        };
        page.offset().ok_or(ApiError::InvalidPage)?;

        Ok(page)
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Wrap one page of results with navigation links built from `base_url`
    /// (scheme, host and path) and the request's raw query string.
    /// The first page always exists; any later page must hold at least one row.
    pub fn wrap<T>(
        &self,
        page: PageRequest,
        total: usize,
        results: Vec<T>,
        base_url: &str,
        query: Option<&str>,
    ) -> Result<Paginated<T>, ApiError> {
        if page.number > self.page_count(total) {
            return Err(ApiError::InvalidPage);
        }

        let next = (page.number < self.page_count(total))
            .then(|| page_url(base_url, query, Some(page.number + 1)));
        let previous = (page.number > 1).then(|| {
            let target = page.number - 1;
            page_url(base_url, query, (target > 1).then_some(target))
        });

        Ok(Paginated {
            count: total,
            next,
            previous,
            results,
        })
    }
}

impl PageRequest {
    /// Rows to skip before this page, `None` when that overflows
    pub fn offset(&self) -> Option<usize> {
        self.number.checked_sub(1)?.checked_mul(self.size)
    }
}

/// Replace (or with `None`, drop) the page parameter, keeping the other
/// parameters in their original, already-encoded form.
fn page_url(base_url: &str, query: Option<&str>, page: Option<usize>) -> String {
    let mut pairs: Vec<String> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(PAGE_PARAM))
        .map(str::to_string)
        .collect();

    if let Some(page) = page {
        pairs.push(format!("{}={}", PAGE_PARAM, page));
    }

    if pairs.is_empty() {
        base_url.to_string()
    } else {
        format!("{}?{}", base_url, pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3001/pets";

    #[test]
    fn test_page_parsing() {
        let paginator = Paginator::new(2);

        assert_eq!(paginator.request(None).unwrap().number, 1);
        assert_eq!(paginator.request(Some("")).unwrap().number, 1);
        assert_eq!(paginator.request(Some("3")).unwrap().number, 3);
        assert!(matches!(paginator.request(Some("0")), Err(ApiError::InvalidPage)));
        assert!(matches!(paginator.request(Some("-1")), Err(ApiError::InvalidPage)));
        assert!(matches!(paginator.request(Some("abc")), Err(ApiError::InvalidPage)));
    }

    #[test]
    fn test_page_past_the_end() {
        let paginator = Paginator::new(2);
        let page = paginator.request(Some("4")).unwrap();

        assert!(matches!(
            paginator.wrap(page, 5, Vec::<u8>::new(), BASE, None),
            Err(ApiError::InvalidPage)
        ));
    }

    #[test]
    fn test_first_page_exists_when_empty() {
        let paginator = Paginator::new(2);
        let page = paginator.request(None).unwrap();
        let wrapped = paginator.wrap(page, 0, Vec::<u8>::new(), BASE, None).unwrap();

        assert_eq!(page.offset(), Some(0));
        assert_eq!(wrapped.count, 0);
        assert_eq!(wrapped.next, None);
        assert_eq!(wrapped.previous, None);
    }

    #[test]
    fn test_offset() {
        let page = PageRequest { number: 3, size: 4 };
        assert_eq!(page.offset(), Some(8));

        let page = PageRequest { number: usize::MAX, size: 2 };
        assert_eq!(page.offset(), None);
    }

    #[test]
    fn test_huge_page_number_is_invalid() {
        let paginator = Paginator::new(2);

        assert!(matches!(
            paginator.request(Some("18446744073709551615")),
            Err(ApiError::InvalidPage)
        ));
        assert!(matches!(
            paginator.request(Some("99999999999999999999999")),
            Err(ApiError::InvalidPage)
        ));
        // Page size one never overflows, the range check rejects it later
        assert!(Paginator::new(1).request(Some("18446744073709551615")).is_ok());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        assert_eq!(Paginator::new(0).page_size(), 1);
    }

    #[test]
    fn test_links_on_middle_page() {
        let paginator = Paginator::new(2);
        let page = paginator.request(Some("2")).unwrap();
        let wrapped = paginator
            .wrap(page, 6, vec![3, 4], BASE, Some("trait=fas&page=2"))
            .unwrap();

        assert_eq!(wrapped.count, 6);
        assert_eq!(wrapped.next.as_deref(), Some("http://localhost:3001/pets?trait=fas&page=3"));
        assert_eq!(wrapped.previous.as_deref(), Some("http://localhost:3001/pets?trait=fas"));
    }

    #[test]
    fn test_links_on_edges() {
        let paginator = Paginator::new(2);

        let first = paginator
            .wrap(paginator.request(None).unwrap(), 3, vec![1, 2], BASE, None)
            .unwrap();
        assert_eq!(first.next.as_deref(), Some("http://localhost:3001/pets?page=2"));
        assert_eq!(first.previous, None);

        let last = paginator
            .wrap(paginator.request(Some("2")).unwrap(), 3, vec![3], BASE, Some("page=2"))
            .unwrap();
        assert_eq!(last.next, None);
        assert_eq!(last.previous.as_deref(), Some("http://localhost:3001/pets"));
    }

    #[test]
    fn test_previous_keeps_page_number_past_two() {
        let paginator = Paginator::new(1);
        let page = paginator.request(Some("3")).unwrap();
        let wrapped = paginator
            .wrap(page, 3, vec!['c'], BASE, Some("page=3"))
            .unwrap();

        assert_eq!(wrapped.previous.as_deref(), Some("http://localhost:3001/pets?page=2"));
    }
}
