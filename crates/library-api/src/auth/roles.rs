//! 역할 기반 접근 제어 (RBAC).
//!
//! 역할(`staff`, `student`)별 권한 정의.

pub use library_core::Role;

/// 시스템 권한.
///
/// 각 작업에 필요한 권한을 정의합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// 도서/카테고리 조회
    BrowseCatalog,
    /// 본인 명의 대출/반납
    BorrowBooks,
    /// 도서/카테고리 생성, 수정, 삭제
    ManageCatalog,
    /// 사용자 관리
    ManageUsers,
    /// 예약 생성/취소/조회
    ManageReservations,
    /// 다른 사용자의 대출 기록 조회 및 대리 처리
    ManageLending,
}

impl Permission {
    /// 권한에 대한 설명 반환.
    pub fn description(&self) -> &'static str {
        match self {
            Permission::BrowseCatalog => "도서 목록 조회",
            Permission::BorrowBooks => "도서 대출/반납",
            Permission::ManageCatalog => "도서 카탈로그 관리",
            Permission::ManageUsers => "사용자 관리",
            Permission::ManageReservations => "예약 관리",
            Permission::ManageLending => "대출 기록 관리",
        }
    }
}

/// 역할별 권한 확인.
pub trait RoleExt {
    /// 역할이 특정 권한을 가지는지 확인.
    fn has_permission(&self, permission: Permission) -> bool;

    /// 역할의 우선순위 레벨 반환 (높을수록 더 많은 권한).
    fn level(&self) -> u8;
}

impl RoleExt for Role {
    fn has_permission(&self, permission: Permission) -> bool {
        match self {
            Role::Staff => true,
            Role::Student => matches!(
                permission,
                Permission::BrowseCatalog | Permission::BorrowBooks
            ),
        }
    }

    fn level(&self) -> u8 {
        match self {
            Role::Staff => 100,
            Role::Student => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        // Staff는 모든 권한 보유
        assert!(Role::Staff.has_permission(Permission::ManageUsers));
        assert!(Role::Staff.has_permission(Permission::ManageCatalog));
        assert!(Role::Staff.has_permission(Permission::BorrowBooks));

        // Student는 조회와 본인 대출만
        assert!(Role::Student.has_permission(Permission::BrowseCatalog));
        assert!(Role::Student.has_permission(Permission::BorrowBooks));
        assert!(!Role::Student.has_permission(Permission::ManageReservations));
        assert!(!Role::Student.has_permission(Permission::ManageLending));
    }

    #[test]
    fn test_role_level() {
        assert!(Role::Staff.level() > Role::Student.level());
    }

    #[test]
    fn test_permission_descriptions() {
        assert_eq!(Permission::ManageUsers.description(), "사용자 관리");
    }
}
