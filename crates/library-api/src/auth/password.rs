//! 비밀번호 해싱.
//!
//! Argon2id로 해싱하며, 해싱은 CPU 부담이 커서 요청 처리 경로에서는
//! [`hash_password_async`] / [`verify_password_async`]를 사용합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 최소 비밀번호 길이.
pub const MIN_PASSWORD_LEN: usize = 8;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("비밀번호 검증 실패")]
    VerificationFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("password must be at least 8 characters and contain a letter and a digit")]
    TooWeak,
}

/// PHC 형식 해시 문자열을 생성합니다.
///
/// ```rust,ignore
/// let hash = hash_password("correct-horse-1").unwrap();
/// // "$argon2id$v=19$m=19456,t=2,p=1$..."
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::HashingFailed)
}

/// 저장된 해시와 비밀번호를 비교합니다.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// 블로킹 스레드에서 해싱합니다.
pub async fn hash_password_async(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| PasswordError::HashingFailed)?
}

/// 블로킹 스레드에서 검증합니다.
pub async fn verify_password_async(password: String, hash: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|_| PasswordError::VerificationFailed)?
}

/// 가입/계정 생성 시 비밀번호 규칙을 확인합니다.
///
/// 최소 8자, 영문자와 숫자를 각각 하나 이상 포함해야 합니다.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());

    if long_enough && has_digit && has_letter {
        Ok(())
    } else {
        Err(PasswordError::TooWeak)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("shelf-mark-42").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("shelf-mark-42", &hash).is_ok());
        assert!(matches!(
            verify_password("shelf-mark-43", &hash),
            Err(PasswordError::VerificationFailed)
        ));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let first = hash_password("library123").unwrap();
        let second = hash_password("library123").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("library123", &first).is_ok());
        assert!(verify_password("library123", &second).is_ok());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("library123", "plain-text");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("library1").is_ok());
        assert!(validate_password_strength("Borrow2Return").is_ok());

        assert!(validate_password_strength("").is_err());
        assert!(validate_password_strength("lib1").is_err());
        assert!(validate_password_strength("librarian").is_err());
        assert!(validate_password_strength("12345678").is_err());
    }

    #[test]
    fn test_strength_counts_characters_not_bytes() {
        // 한글 5자 + 숫자 2자 = 7자
        assert!(validate_password_strength("도서관회원12").is_err());
        assert!(validate_password_strength("도서관회원a12").is_ok());
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let hash = hash_password_async("checkout99".to_string()).await.unwrap();
        assert!(verify_password_async("checkout99".to_string(), hash.clone())
            .await
            .is_ok());
        assert!(verify_password_async("checkout98".to_string(), hash)
            .await
            .is_err());
    }
}
