use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Board, Credential};
use crate::error::{SyncError, SyncResult};
use crate::model::board::{BoardItem, FoundItem, LinkedItem, WriteOutcome};

pub const MONDAY_API: &str = "https://api.monday.com/v2";
pub const DEFAULT_STATUS_COLUMN: &str = "color_mkrbrgx9";

const ITEMS_QUERY: &str = r#"query ($board: [ID!]) {
  boards(ids: $board) {
    id
    items_page(limit: 500) {
      cursor
      items { id name column_values { id text } }
    }
  }
}"#;

const NEXT_ITEMS_QUERY: &str = r#"query ($cursor: String!) {
  next_items_page(cursor: $cursor, limit: 500) {
    cursor
    items { id name column_values { id text } }
  }
}"#;

const CHANGE_STATUS_MUTATION: &str = r#"mutation ($item: ID!, $board: ID!, $column: String!, $value: JSON!) {
  change_column_value(item_id: $item, board_id: $board, column_id: $column, value: $value) {
    id
    name
    column_values { id text }
  }
}"#;

pub struct MondayClient {
    api_url: String,
    credential: Credential,
    status_column: String,
    link_column: String,
    client: reqwest::Client,
}

impl MondayClient {
    pub fn new(api_token: String, link_column: String) -> Self {
        Self {
            api_url: MONDAY_API.to_string(),
            credential: Credential::Raw(api_token),
            status_column: DEFAULT_STATUS_COLUMN.to_string(),
            link_column,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_status_column(mut self, column: impl Into<String>) -> Self {
        self.status_column = column.into();
        self
    }

    /// POSTs one GraphQL document and decodes the envelope.
    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> SyncResult<GqlResponse<T>> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(&self.api_url)
            .header("Authorization", self.credential.header_value())
            .header("Content-Type", "application/json")
            .header("API-Version", "2024-10")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized {
                url: self.api_url.clone(),
                body: text,
            });
        }
        if !status.is_success() {
            return Err(SyncError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| SyncError::MalformedResponse(format!("monday response: {e}")))
    }

    /// Every item on `board_ids` paired with its board id, following page cursors.
    async fn board_items(&self, board_ids: &[String]) -> SyncResult<Vec<(String, ItemNode)>> {
        let gql: GqlResponse<BoardsData> = self
            .post(ITEMS_QUERY, serde_json::json!({ "board": board_ids }))
            .await?;
        let data = gql.into_data("board listing")?;

        let mut items = Vec::new();
        for board in data.boards {
            let Some(mut page) = board.items_page else {
                continue;
            };
            loop {
                items.extend(page.items.into_iter().map(|item| (board.id.clone(), item)));
                let Some(cursor) = page.cursor else {
                    break;
                };
                debug!(board = %board.id, "Fetching next items page");
                let gql: GqlResponse<NextPageData> = self
                    .post(NEXT_ITEMS_QUERY, serde_json::json!({ "cursor": cursor }))
                    .await?;
                match gql.into_data("items page")?.next_items_page {
                    Some(next) => page = next,
                    None => break,
                }
            }
        }
        Ok(items)
    }
}

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GqlError>,
    error_message: Option<String>,
}

impl<T> GqlResponse<T> {
    /// Error messages from both the GraphQL `errors` list and the legacy `error_message` field.
    fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| e.message.clone())
            .chain(self.error_message.clone())
            .collect()
    }

    /// The `data` payload. GraphQL errors are upstream failures even under HTTP 200.
    fn into_data(self, what: &str) -> SyncResult<T> {
        let errors = self.error_messages();
        if !errors.is_empty() {
            return Err(SyncError::Upstream {
                status: 200,
                body: errors.join("; "),
            });
        }
        self.data
            .ok_or_else(|| SyncError::MalformedResponse(format!("no data in {what}")))
    }
}

#[derive(Deserialize)]
struct GqlError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct BoardsData {
    #[serde(default)]
    boards: Vec<BoardNode>,
}

#[derive(Deserialize)]
struct BoardNode {
    #[serde(default)]
    id: String,
    items_page: Option<ItemsPage>,
}

#[derive(Deserialize)]
struct ItemsPage {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<ItemNode>,
}

#[derive(Deserialize)]
struct NextPageData {
    next_items_page: Option<ItemsPage>,
}

#[derive(Deserialize)]
struct ItemNode {
    id: String,
    name: String,
    #[serde(default)]
    column_values: Vec<ColumnValue>,
}

#[derive(Deserialize)]
struct ColumnValue {
    id: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChangeData {
    change_column_value: Option<ItemNode>,
}

fn column_text<'a>(columns: &'a [ColumnValue], column_id: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| c.id == column_id)
        .and_then(|c| c.text.as_deref())
}

#[async_trait]
impl Board for MondayClient {
    fn name(&self) -> &str {
        "monday.com"
    }

    async fn list_linked_items(&self, board_id: &str) -> SyncResult<Vec<LinkedItem>> {
        let nodes = self.board_items(&[board_id.to_string()]).await?;

        let items: Vec<LinkedItem> = nodes
            .into_iter()
            .filter_map(|(_, node)| {
                let link = column_text(&node.column_values, &self.link_column)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())?
                    .to_string();
                Some(LinkedItem {
                    item: BoardItem {
                        id: node.id,
                        name: node.name,
                    },
                    link_text: link,
                })
            })
            .collect();

        debug!(board = board_id, linked = items.len(), "Listed linked board items");
        Ok(items)
    }

    async fn find_item_by_name(
        &self,
        board_ids: &[String],
        name: &str,
    ) -> SyncResult<Option<FoundItem>> {
        let wanted = name.to_lowercase();
        let found = self
            .board_items(board_ids)
            .await?
            .into_iter()
            .find(|(_, node)| node.name.to_lowercase() == wanted)
            .map(|(board_id, node)| FoundItem {
                board_id,
                item: BoardItem {
                    id: node.id,
                    name: node.name,
                },
            });
        if found.is_none() {
            debug!(item = name, boards = ?board_ids, "No board item with that name");
        }
        Ok(found)
    }

    async fn set_item_status(
        &self,
        item_id: &str,
        board_id: &str,
        label: &str,
    ) -> SyncResult<WriteOutcome> {
        let value = serde_json::json!({ "label": label }).to_string();
        let gql: GqlResponse<ChangeData> = self
            .post(
                CHANGE_STATUS_MUTATION,
                serde_json::json!({
                    "item": item_id,
                    "board": board_id,
                    "column": self.status_column,
                    "value": value,
                }),
            )
            .await?;

        let errors = gql.error_messages();
        if !errors.is_empty() {
            for message in &errors {
                warn!(item = item_id, error = %message, "monday mutation rejected");
            }
            return Ok(WriteOutcome::Rejected(errors));
        }

        match gql.data.and_then(|d| d.change_column_value) {
            Some(item) => Ok(WriteOutcome::Applied {
                status_text: column_text(&item.column_values, &self.status_column)
                    .map(String::from),
                item_name: item.name,
            }),
            None => Ok(WriteOutcome::Rejected(vec![
                "No data returned from mutation".into(),
            ])),
        }
    }
}
