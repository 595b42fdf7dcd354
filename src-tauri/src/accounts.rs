use serde::Serialize;
use tauri::State;

/// Download account credentials. The set is fixed at startup.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password: String,
}

/// Listing shape sent to the webview; passwords never leave the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub username: String,
}

pub struct AccountsState {
    accounts: Vec<Account>,
}

fn account(id: &str, username: &str, password: &str) -> Account {
    Account {
        id: id.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    }
}

impl AccountsState {
    /// The built-in shared download accounts.
    pub fn builtin() -> Self {
        Self {
            accounts: vec![
                account("1", "ruiiixx", "S67GBTB83D3Y"),
                account("2", "premexilmenledgconis", "3pXbHZJlDb"),
                account("3", "vAbuDy", "Boolq8vip"),
                account("4", "adgjl1182", "QETUO99999"),
                account("5", "gobjj16182", "zuobiao8222"),
                account("6", "787109690", "HucUxYMQig15"),
            ],
        }
    }

    pub fn find(&self, id: &str) -> Option<Account> {
        self.accounts.iter().find(|a| a.id == id).cloned()
    }

    pub fn first_id(&self) -> Option<String> {
        self.accounts.first().map(|a| a.id.clone())
    }

    pub fn list(&self) -> Vec<AccountInfo> {
        self.accounts
            .iter()
            .map(|a| AccountInfo {
                id: a.id.clone(),
                username: a.username.clone(),
            })
            .collect()
    }
}

#[tauri::command]
pub fn get_accounts(state: State<AccountsState>) -> Vec<AccountInfo> {
    state.list()
}
