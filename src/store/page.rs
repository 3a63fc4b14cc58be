use serde::{Deserialize, Serialize};

/// Direction applied to the creation timestamp when listing orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size: size.max(1) }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1) as u64;
        let total_pages = total_elements.div_ceil(size) as u32;

        Self {
            content,
            page_number: request.page,
            page_size: request.size,
            total_elements,
            total_pages,
            last: request.page.saturating_add(1) >= total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            last: self.last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_arithmetic() {
        let request = PageRequest::new(1, 10);
        let page = Page::new(vec![0; 10], &request, 25);

        assert_eq!(request.offset(), 10);
        assert_eq!(page.total_pages, 3);
        assert!(!page.last);
    }

    #[test]
    fn test_last_page_and_empty_result() {
        let last = Page::new(vec![1, 2, 3, 4, 5], &PageRequest::new(2, 10), 25);
        assert!(last.last);

        let empty: Page<i32> = Page::new(vec![], &PageRequest::new(0, 10), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.last);
    }

    #[test]
    fn test_page_past_the_end_is_last() {
        let page: Page<i32> = Page::new(vec![], &PageRequest::new(u32::MAX, 10), 0);
        assert!(page.last);
        assert_eq!(page.page_number, u32::MAX);

        let page: Page<i32> = Page::new(vec![], &PageRequest::new(u32::MAX, 10), 25);
        assert!(page.last);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let json = serde_json::to_value(Page::new(vec![1], &PageRequest::new(0, 5), 1)).unwrap();

        assert_eq!(json["pageNumber"], 0);
        assert_eq!(json["pageSize"], 5);
        assert_eq!(json["totalElements"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["last"], true);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(PageRequest::new(0, 0).size, 1);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], &PageRequest::new(0, 2), 3).map(|n| n * 10);

        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
    }
}
