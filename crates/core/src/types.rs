/// Client-generated correlation id for one logical server operation.
pub type TaskId = String;

/// Generate a fresh task id (UUID v4).
///
/// Ids are allocated on the client so the submission request can carry
/// the id before the server has seen the operation.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}
