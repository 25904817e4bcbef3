use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    /// Unpaginated collections only report their size.
    pub fn count(total: usize) -> Self {
        Self {
            page: None,
            per_page: None,
            total: Some(total as i64),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Body of a successful delete.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq)]
pub struct Deleted {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

impl ApiResponse<Deleted> {
    pub fn deleted(id: Uuid) -> Self {
        Self::success("Deleted", Deleted { id }, Some(Meta::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_meta_has_no_paging() {
        let meta = Meta::count(3);
        assert_eq!(meta.total, Some(3));
        assert!(meta.page.is_none() && meta.per_page.is_none());
    }

    #[test]
    fn deleted_envelope_echoes_id() {
        let id = Uuid::new_v4();
        let body = serde_json::to_value(ApiResponse::deleted(id)).unwrap();
        assert_eq!(body["message"], "Deleted");
        assert_eq!(body["data"]["id"], id.to_string());
    }
}
