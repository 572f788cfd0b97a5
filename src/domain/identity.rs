use uuid::Uuid;

use super::order::OrderError;

// ============================================================================
// Caller Identity
// ============================================================================
//
// The identity collaborator hands over whatever claim it resolved for the
// request. The engine only parses it into a member id and never
// authenticates.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    member_id: Option<Uuid>,
}

impl Caller {
    pub fn member(member_id: Uuid) -> Self {
        Self {
            member_id: Some(member_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { member_id: None }
    }

    /// Parse the raw name-identifier claim. Missing or malformed claims
    /// produce an anonymous caller.
    pub fn from_claim(claim: Option<&str>) -> Self {
        let member_id = claim
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .and_then(|c| Uuid::parse_str(c).ok());
        Self { member_id }
    }

    pub fn member_id(&self) -> Result<Uuid, OrderError> {
        self.member_id
            .ok_or_else(|| OrderError::Authentication("could not identify the calling member".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_claim_parses_uuid() {
        let id = Uuid::new_v4();
        let caller = Caller::from_claim(Some(&id.to_string()));
        assert_eq!(caller.member_id().unwrap(), id);
    }

    #[test]
    fn test_missing_or_invalid_claim_is_anonymous() {
        for claim in [None, Some(""), Some("   "), Some("42"), Some("not-a-uuid")] {
            let caller = Caller::from_claim(claim);
            assert_eq!(caller, Caller::anonymous());
            assert!(matches!(caller.member_id(), Err(OrderError::Authentication(_))));
        }
    }
}
