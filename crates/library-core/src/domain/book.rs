//! 도서 타입.
//!
//! - `Availability` - 도서 대출 가능 상태
//! - `Book` - 도서 엔티티
//! - `NewBook` / `BookUpdate` - 생성/수정 입력
//!
//! `availability`는 대출/반납/예약 기록에서 파생되는 값이므로
//! 입력 타입에는 포함되지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};

/// 도서 대출 가능 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum Availability {
    /// 대출 가능
    Available,
    /// 대출 중
    Borrowed,
    /// 예약자에게 확보됨 (예약자만 대출 가능)
    Reserved,
}

impl Availability {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Borrowed => "Borrowed",
            Self::Reserved => "Reserved",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Borrowed" => Some(Self::Borrowed),
            "Reserved" => Some(Self::Reserved),
            _ => None,
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 도서 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub publication: String,
    /// 판(edition)마다 고유
    pub isbn: String,
    pub genre: String,
    pub edition: String,
    /// 보유 권수
    pub copies: i32,
    pub category_id: i64,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 새 도서 입력.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct NewBook {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publication: String,
    pub isbn: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub edition: String,
    #[serde(default = "default_copies")]
    pub copies: i32,
    pub category_id: i64,
}

fn default_copies() -> i32 {
    1
}

impl NewBook {
    /// 필수 필드를 확인합니다.
    pub fn validate(&self) -> LibraryResult<()> {
        if self.name.trim().is_empty() || self.isbn.trim().is_empty() || self.category_id <= 0 {
            return Err(LibraryError::InvalidInput(
                "name, isbn, and category_id are required".to_string(),
            ));
        }
        if self.copies < 1 {
            return Err(LibraryError::InvalidInput(
                "copies must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 도서 수정 입력.
///
/// 지정된 필드만 변경됩니다. 대출 상태는 수정할 수 없습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct BookUpdate {
    pub name: Option<String>,
    pub author: Option<String>,
    pub publication: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub edition: Option<String>,
    pub copies: Option<i32>,
    pub category_id: Option<i64>,
}

impl BookUpdate {
    /// 빈 문자열이나 0 이하의 값은 허용하지 않습니다.
    pub fn validate(&self) -> LibraryResult<()> {
        let blank = [&self.name, &self.isbn]
            .iter()
            .any(|field| field.as_deref().is_some_and(|s| s.trim().is_empty()));
        if blank {
            return Err(LibraryError::InvalidInput(
                "name and isbn must not be blank".to_string(),
            ));
        }
        if self.copies.is_some_and(|c| c < 1) {
            return Err(LibraryError::InvalidInput(
                "copies must be at least 1".to_string(),
            ));
        }
        if self.category_id.is_some_and(|id| id <= 0) {
            return Err(LibraryError::InvalidInput(
                "category_id must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// 수정 내용을 도서에 적용합니다.
    pub fn apply_to(self, book: &mut Book) {
        if let Some(name) = self.name {
            book.name = name;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(publication) = self.publication {
            book.publication = publication;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = isbn;
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(edition) = self.edition {
            book.edition = edition;
        }
        if let Some(copies) = self.copies {
            book.copies = copies;
        }
        if let Some(category_id) = self.category_id {
            book.category_id = category_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_round_trip_names() {
        for availability in [
            Availability::Available,
            Availability::Borrowed,
            Availability::Reserved,
        ] {
            assert_eq!(Availability::parse(availability.as_str()), Some(availability));
        }
        assert_eq!(Availability::parse("Not Available"), None);
    }

    #[test]
    fn test_new_book_requires_fields() {
        let book = NewBook {
            name: "Dune".to_string(),
            isbn: "978-0441013593".to_string(),
            category_id: 1,
            copies: 2,
            ..Default::default()
        };
        assert!(book.validate().is_ok());

        let missing_isbn = NewBook {
            isbn: String::new(),
            ..book.clone()
        };
        assert!(missing_isbn.validate().is_err());

        let no_copies = NewBook { copies: 0, ..book };
        assert!(no_copies.validate().is_err());
    }

    #[test]
    fn test_update_rejects_availability_field() {
        let json = r#"{"name": "Dune", "availability": "Available"}"#;
        assert!(serde_json::from_str::<BookUpdate>(json).is_err());
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let now = Utc::now();
        let mut book = Book {
            id: 1,
            name: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            publication: "Chilton".to_string(),
            isbn: "978-0441013593".to_string(),
            genre: "SF".to_string(),
            edition: "1st".to_string(),
            copies: 1,
            category_id: 1,
            availability: Availability::Borrowed,
            created_at: now,
            updated_at: now,
        };

        BookUpdate {
            edition: Some("2nd".to_string()),
            copies: Some(3),
            ..Default::default()
        }
        .apply_to(&mut book);

        assert_eq!(book.edition, "2nd");
        assert_eq!(book.copies, 3);
        assert_eq!(book.name, "Dune");
        assert_eq!(book.availability, Availability::Borrowed);
    }
}
