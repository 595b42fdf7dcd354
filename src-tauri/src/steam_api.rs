use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_plugin_opener::OpenerExt;

const PUBLISHED_FILE_DETAILS_URL: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";
const STORE_SEARCH_URL: &str = "https://store.steampowered.com/api/storesearch/";
const WORKSHOP_PAGE_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/";

/// Response envelope from GetPublishedFileDetails
#[derive(Debug, Deserialize)]
struct PublishedFileResponse {
    response: PublishedFileBody,
}

#[derive(Debug, Deserialize)]
struct PublishedFileBody {
    #[serde(default)]
    publishedfiledetails: Vec<RawFileDetails>,
}

/// Per-item payload from GetPublishedFileDetails. `result` is Steam's
/// EResult; 1 means OK. `file_size` arrives as a decimal string.
#[derive(Debug, Deserialize)]
struct RawFileDetails {
    result: i32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    file_size: Option<String>,
}

/// Workshop item preview data. Field names match the persisted frontend
/// contract (snake_case).
#[derive(Debug, Clone, Serialize)]
pub struct WorkshopItemDetails {
    pub title: String,
    pub preview_url: Option<String>,
    pub creator: Option<String>,
    pub file_size: Option<u64>,
}

fn details_from_raw(item_id: &str, raw: RawFileDetails) -> Result<WorkshopItemDetails, String> {
    if raw.result != 1 {
        return Err(format!(
            "Workshop item {} not found (result {})",
            item_id, raw.result
        ));
    }
    Ok(WorkshopItemDetails {
        title: raw.title.unwrap_or_else(|| item_id.to_string()),
        preview_url: raw.preview_url,
        creator: raw.creator,
        file_size: raw.file_size.and_then(|s| s.parse().ok()),
    })
}

/// Fetches preview details for one workshop item.
///
/// Uses the public GetPublishedFileDetails endpoint, no authentication
/// required. Failures surface to the UI only and never abort a batch.
#[tauri::command]
pub async fn get_workshop_details(item_id: String) -> Result<WorkshopItemDetails, String> {
    let params = [
        ("itemcount", "1"),
        ("publishedfileids[0]", item_id.as_str()),
    ];
    let response = reqwest::Client::new()
        .post(PUBLISHED_FILE_DETAILS_URL)
        .form(&params)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch workshop details: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Steam API returned status {}", response.status()));
    }

    let body: PublishedFileResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse workshop details: {}", e))?;

    let raw = body
        .response
        .publishedfiledetails
        .into_iter()
        .next()
        .ok_or_else(|| format!("No data returned for workshop item {}", item_id))?;

    details_from_raw(&item_id, raw)
}

#[derive(Debug, Deserialize)]
struct StoreSearchResponse {
    #[serde(default)]
    items: Vec<StoreSearchItem>,
}

#[derive(Debug, Deserialize)]
struct StoreSearchItem {
    id: u64,
    name: String,
    #[serde(default)]
    tiny_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSearchResult {
    pub app_id: String,
    pub name: String,
    pub icon: Option<String>,
}

impl From<StoreSearchItem> for GameSearchResult {
    fn from(item: StoreSearchItem) -> Self {
        Self {
            app_id: item.id.to_string(),
            name: item.name,
            icon: item.tiny_image,
        }
    }
}

/// Searches the Steam store for games matching `query`.
#[tauri::command]
pub async fn search_steam_games(query: String) -> Result<Vec<GameSearchResult>, String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let response = reqwest::Client::new()
        .get(STORE_SEARCH_URL)
        .query(&[("term", trimmed), ("cc", "us"), ("l", "en")])
        .send()
        .await
        .map_err(|e| format!("Failed to search Steam games: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Steam API returned status {}", response.status()));
    }

    let body: StoreSearchResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse game search results: {}", e))?;

    Ok(body.items.into_iter().map(GameSearchResult::from).collect())
}

/// Opens the item's workshop page in the system browser.
#[tauri::command]
pub fn open_workshop_page(app_handle: AppHandle, item_id: String) -> Result<(), String> {
    app_handle
        .opener()
        .open_url(
            format!("{}?id={}", WORKSHOP_PAGE_URL, item_id),
            None::<String>,
        )
        .map_err(|e| format!("Failed to open workshop page: {}", e))
}
