//! Plain state shared by the store implementations.

use chrono::Utc;
use meb_core::{Error, PendingAuthorization, Result, User, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    pub users: HashMap<UserId, User>,
    #[serde(default)]
    pub pending: HashMap<String, PendingAuthorization>,
}

impl StoreState {
    pub fn create_user(&mut self, user_id: UserId, language_code: &str) -> Result<()> {
        if self.users.contains_key(&user_id) {
            return Err(Error::StoreDuplicateUser);
        }
        self.users.insert(user_id, User::new(user_id, language_code));
        Ok(())
    }

    pub fn update_language_code(&mut self, user_id: UserId, language_code: &str) -> Result<()> {
        let user = self.users.get_mut(&user_id).ok_or(Error::NoUser)?;
        user.language_code = language_code.to_string();
        Ok(())
    }

    pub fn update_credential(&mut self, user_id: UserId, credential: &str) -> Result<()> {
        let user = self.users.get_mut(&user_id).ok_or(Error::NoUser)?;
        user.credential = Some(credential.to_string());
        Ok(())
    }

    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        self.users.get(&user_id).cloned().ok_or(Error::NoUser)
    }

    pub fn insert_pending(&mut self, pending: PendingAuthorization) -> Result<()> {
        // States are random; a collision means the generator is broken.
        if self.pending.contains_key(&pending.state) {
            return Err(Error::StoreInternal(
                "authorization state already exists".to_string(),
            ));
        }
        self.pending.insert(pending.state.clone(), pending);
        Ok(())
    }

    pub fn take_pending(&mut self, state: &str) -> Result<PendingAuthorization> {
        let pending = self.pending.remove(state).ok_or(Error::NoState)?;

        if pending.is_expired() {
            return Err(Error::NoState);
        }

        Ok(pending)
    }

    pub fn cleanup_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.pending.len();
        self.pending.retain(|_, pending| now <= pending.expires_at);
        before - self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_take_pending_removes_even_when_expired() {
        let mut state = StoreState::default();
        let mut pending = PendingAuthorization::new("s1".into(), "v".into(), 1, 600);
        pending.expires_at = Utc::now() - Duration::seconds(1);
        state.insert_pending(pending).unwrap();

        assert!(matches!(state.take_pending("s1"), Err(Error::NoState)));
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_duplicate_state_is_rejected() {
        let mut state = StoreState::default();
        state
            .insert_pending(PendingAuthorization::new("s1".into(), "a".into(), 1, 600))
            .unwrap();
        let result = state.insert_pending(PendingAuthorization::new("s1".into(), "b".into(), 2, 600));

        assert!(matches!(result, Err(Error::StoreInternal(_))));
        assert_eq!(state.pending["s1"].code_verifier, "a");
    }

    #[test]
    fn test_update_credential_for_missing_user() {
        let mut state = StoreState::default();
        assert!(matches!(state.update_credential(1, "{}"), Err(Error::NoUser)));
    }
}
