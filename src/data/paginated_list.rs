use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::core::{DataError, DataResult};

/// Page metadata as reported by the backend (`page` in HAL responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(rename = "size")]
    pub element_count_per_page: u64,
    pub total_elements: u64,
    pub total_pages: u64,
    #[serde(rename = "number")]
    pub current_page: u64,
}

/// One page of a collection.
///
/// The page never holds more elements than its page size, and the total
/// count is never below the number of elements on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedList<T> {
    page: Vec<T>,
    page_info: PageInfo,
}

impl<T> PaginatedList<T> {
    pub fn new(page: Vec<T>, mut page_info: PageInfo) -> DataResult<Self> {
        let len = page.len() as u64;
        if len > page_info.element_count_per_page {
            return Err(DataError::Decode(format!(
                "page holds {} elements but page size is {}",
                len, page_info.element_count_per_page
            )));
        }
        if page_info.total_elements < len {
            page_info.total_elements = len;
        }
        Ok(Self { page, page_info })
    }

    /// A list that is its own single page.
    pub fn single_page(page: Vec<T>) -> Self {
        let len = page.len() as u64;
        Self {
            page,
            page_info: PageInfo {
                element_count_per_page: len,
                total_elements: len,
                total_pages: if len == 0 { 0 } else { 1 },
                current_page: 0,
            },
        }
    }

    pub fn page(&self) -> &[T] {
        &self.page
    }

    pub fn into_page(self) -> Vec<T> {
        self.page
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    pub fn total_elements(&self) -> u64 {
        self.page_info.total_elements
    }

    pub fn len(&self) -> usize {
        self.page.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_empty()
    }
}

impl<T: DeserializeOwned> PaginatedList<T> {
    /// Decode a HAL collection document.
    ///
    /// Elements come from the array under `_embedded` (whatever its key), page
    /// metadata from `page`. A document without `page` is a single page.
    pub fn from_hal(body: &[u8]) -> DataResult<Self> {
        let document: Value = serde_json::from_slice(body)?;

        let elements = match document.get("_embedded") {
            Some(Value::Object(embedded)) => embedded
                .values()
                .find_map(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            Some(_) => return Err(DataError::Decode("_embedded is not an object".to_string())),
            None => Vec::new(),
        };
        let page = elements
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;

        match document.get("page") {
            Some(info) => {
                let page_info: PageInfo = serde_json::from_value(info.clone())?;
                Self::new(page, page_info)
            }
            None => Ok(Self::single_page(page)),
        }
    }
}
