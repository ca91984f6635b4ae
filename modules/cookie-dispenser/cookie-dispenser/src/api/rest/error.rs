use axum::http::StatusCode;
use modkit_host::Problem;

use crate::domain::error::DomainError;

/// Map a domain error to an RFC 9457 Problem for the route at `instance`.
pub fn domain_error_to_problem(e: &DomainError, instance: &str) -> Problem {
    let trace_id = tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string());

    let problem = match e {
        DomainError::Exhausted => {
            Problem::new(StatusCode::TOO_MANY_REQUESTS, "Cookies Exhausted", e.to_string())
                .with_code("COOKIES_EXHAUSTED")
        }
        DomainError::Rejected { .. } => {
            Problem::new(StatusCode::CONFLICT, "Cookie Refused", e.to_string())
                .with_code("COOKIE_REFUSED")
        }
        DomainError::Persistence(source) => {
            tracing::error!(error = %source, "failed to persist cookie receipt");
            Problem::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An internal storage error occurred",
            )
            .with_code("RECEIPT_STORAGE")
        }
    };

    let problem = problem.with_instance(instance);
    if let Some(id) = trace_id {
        problem.with_trace_id(id)
    } else {
        problem
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        let exhausted = domain_error_to_problem(&DomainError::Exhausted, "/cookies");
        assert_eq!(exhausted.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(exhausted.code, "COOKIES_EXHAUSTED");
        assert_eq!(exhausted.instance, "/cookies");

        let rejected = domain_error_to_problem(&DomainError::rejected("Alex"), "/cookies/guest");
        assert_eq!(rejected.status, StatusCode::CONFLICT);
        assert_eq!(rejected.detail, "I'm sorry Alex, no cookies for you today.");

        let failed = domain_error_to_problem(
            &DomainError::Persistence(anyhow::anyhow!("disk on fire")),
            "/cookies",
        );
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!failed.detail.contains("disk"));
    }
}
