use crate::mode::CoachingMode;
use crate::Turn;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("store call failed: {0}")]
    Api(String),
    #[error("unexpected store response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub credits: u64,
}

/// One coaching session record as persisted. `conversation` holds finalized
/// turns only; the summary is absent until generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub topic: String,
    #[serde(rename = "coachingOption")]
    pub mode: CoachingMode,
    #[serde(rename = "expertName")]
    pub expert_name: String,
    #[serde(default)]
    pub conversation: Vec<Turn>,
    #[serde(default)]
    pub summary: Option<String>,
}

// The reactive store is an external collaborator; this trait is the full
// contract the session core needs from it. Mutations are atomic sets with
// full-replace semantics on the named field.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait CoachStore: Send + Sync {
    /// Idempotent by email: returns the existing user's id when one exists,
    /// otherwise creates the user with the default credit allotment.
    async fn create_user(&self, name: &str, email: &str) -> Result<String, StoreError>;

    async fn get_user_by_id(&self, id: &str) -> Result<UserRecord, StoreError>;

    /// Atomic set. The caller computes the clamped balance beforehand.
    async fn update_user_credits(&self, id: &str, credits: u64) -> Result<(), StoreError>;

    async fn create_room(
        &self,
        topic: &str,
        mode: CoachingMode,
        expert_name: &str,
        user_id: &str,
    ) -> Result<String, StoreError>;

    async fn get_room(&self, id: &str) -> Result<RoomRecord, StoreError>;

    async fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<RoomRecord>, StoreError>;

    /// Full replace of the persisted transcript.
    async fn update_conversation(&self, id: &str, turns: &[Turn]) -> Result<(), StoreError>;

    /// Full replace of the session summary.
    async fn update_summary(&self, id: &str, summary: &str) -> Result<(), StoreError>;
}

/// Store client speaking the Convex HTTP function API: one POST per
/// query/mutation, `{path, args, format}` in, `{status, value}` out.
pub struct ConvexStore {
    client: reqwest::Client,
    deployment_url: String,
}

#[derive(Debug, Deserialize)]
struct FunctionResult {
    status: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(rename = "errorMessage")]
    #[serde(default)]
    error_message: Option<String>,
}

impl ConvexStore {
    pub fn new(deployment_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            deployment_url: deployment_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        path: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        let url = format!("{}/api/{}", self.deployment_url, endpoint);
        let body = serde_json::json!({
            "path": path,
            "args": args,
            "format": "json",
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api(format!("{path}: {status}: {detail}")));
        }

        let result = resp.json::<FunctionResult>().await?;
        if result.status != "success" {
            return Err(StoreError::Api(format!(
                "{path}: {}",
                result.error_message.unwrap_or_else(|| result.status.clone())
            )));
        }
        Ok(result.value)
    }

    async fn query(&self, path: &str, args: serde_json::Value) -> Result<serde_json::Value, StoreError> {
        self.call("query", path, args).await
    }

    async fn mutation(
        &self,
        path: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        self.call("mutation", path, args).await
    }

    fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CoachStore for ConvexStore {
    async fn create_user(&self, name: &str, email: &str) -> Result<String, StoreError> {
        let value = self
            .mutation(
                "users:CreateUser",
                serde_json::json!({ "name": name, "email": email }),
            )
            .await?;
        Self::decode(value)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<UserRecord, StoreError> {
        let value = self
            .query("users:GetUserById", serde_json::json!({ "id": id }))
            .await?;
        Self::decode(value)
    }

    async fn update_user_credits(&self, id: &str, credits: u64) -> Result<(), StoreError> {
        self.mutation(
            "users:UpdateUserToken",
            serde_json::json!({ "id": id, "credits": credits }),
        )
        .await?;
        Ok(())
    }

    async fn create_room(
        &self,
        topic: &str,
        mode: CoachingMode,
        expert_name: &str,
        user_id: &str,
    ) -> Result<String, StoreError> {
        let value = self
            .mutation(
                "DiscussionRoom:CreateNewRoom",
                serde_json::json!({
                    "topic": topic,
                    "coachingOption": mode,
                    "expertName": expert_name,
                    "uid": user_id,
                }),
            )
            .await?;
        Self::decode(value)
    }

    async fn get_room(&self, id: &str) -> Result<RoomRecord, StoreError> {
        let value = self
            .query("DiscussionRoom:GetDiscussionRoom", serde_json::json!({ "id": id }))
            .await?;
        Self::decode(value)
    }

    async fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<RoomRecord>, StoreError> {
        let value = self
            .query(
                "DiscussionRoom:GetAllDiscussionRoom",
                serde_json::json!({ "uid": user_id }),
            )
            .await?;
        Self::decode(value)
    }

    async fn update_conversation(&self, id: &str, turns: &[Turn]) -> Result<(), StoreError> {
        self.mutation(
            "DiscussionRoom:UpdateConversation",
            serde_json::json!({ "id": id, "conversation": turns }),
        )
        .await?;
        Ok(())
    }

    async fn update_summary(&self, id: &str, summary: &str) -> Result<(), StoreError> {
        self.mutation(
            "DiscussionRoom:UpdateSummary",
            serde_json::json!({ "id": id, "summary": summary }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_record_round_trips_stored_field_names() {
        let raw = r#"{
            "_id": "room-1",
            "topic": "ownership",
            "coachingOption": "Topic Base Lecture",
            "expertName": "Joanna",
            "conversation": [
                { "role": "assistant", "content": "Welcome!" },
                { "role": "user", "content": "hello" }
            ]
        }"#;
        let room: RoomRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(room.mode, CoachingMode::Lecture);
        assert_eq!(room.expert_name, "Joanna");
        assert_eq!(room.conversation.len(), 2);
        assert!(room.summary.is_none());

        let back = serde_json::to_value(&room).unwrap();
        assert_eq!(back["coachingOption"], "Topic Base Lecture");
        assert_eq!(back["conversation"][1]["role"], "user");
    }

    #[test]
    fn function_result_error_is_reported() {
        let raw = r#"{ "status": "error", "errorMessage": "no such room" }"#;
        let result: FunctionResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.status, "error");
        assert_eq!(result.error_message.as_deref(), Some("no such room"));
    }
}
