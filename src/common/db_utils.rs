// src/common/db_utils.rs

// SQLSTATEs que nunca adianta repetir
pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Extrai o SQLSTATE de um erro do sqlx, se ele veio do banco.
pub fn sql_state(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned())
}

/// Erros de integridade e de permissão: repetir a operação dá o mesmo resultado.
pub fn is_permanent_sql_state(code: &str) -> bool {
    matches!(code, UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION | INSUFFICIENT_PRIVILEGE)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
pub mod test_support {
    use std::borrow::Cow;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::{FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};

    // Erro do Postgres com um SQLSTATE escolhido, sem precisar de banco
    #[derive(Debug)]
    struct FakePgError(&'static str);

    impl fmt::Display for FakePgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "erro {}", self.0)
        }
    }

    impl std::error::Error for FakePgError {}

    impl DatabaseError for FakePgError {
        fn message(&self) -> &str {
            "erro simulado"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                UNIQUE_VIOLATION => ErrorKind::UniqueViolation,
                FOREIGN_KEY_VIOLATION => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    pub fn database_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakePgError(code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::database_error;

    #[test]
    fn classifies_permanent_states() {
        assert!(is_permanent_sql_state("23505"));
        assert!(is_permanent_sql_state("23503"));
        assert!(is_permanent_sql_state("42501"));
        assert!(!is_permanent_sql_state("40001"));
        assert!(!is_permanent_sql_state("08006"));
    }

    #[test]
    fn non_database_errors_have_no_state() {
        assert_eq!(sql_state(&sqlx::Error::RowNotFound), None);
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn database_errors_expose_their_state() {
        let err = database_error("23505");
        assert_eq!(sql_state(&err).as_deref(), Some("23505"));
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&database_error("40001")));
    }
}
