use crate::error::CoreResult;
use crate::store::{KeyValueStore, keys};
use tracing::info;
use uuid::Uuid;

/// The session token stored under `user_session_id`, created on first use.
pub fn current_session_id(store: &dyn KeyValueStore) -> CoreResult<String> {
    if let Some(existing) = store.get(keys::SESSION_ID)?.filter(|id| !id.trim().is_empty()) {
        return Ok(existing);
    }
    let session_id = Uuid::new_v4().to_string();
    store.set(keys::SESSION_ID, &session_id)?;
    info!(%session_id, "started new session");
    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_session_id_is_generated_once() {
        let store = MemoryStore::new();
        let first = current_session_id(&store).unwrap();
        let second = current_session_id(&store).unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_existing_session_id_is_reused() {
        let store = MemoryStore::new();
        store.set(keys::SESSION_ID, "abc123").unwrap();
        assert_eq!(current_session_id(&store).unwrap(), "abc123");
    }
}
