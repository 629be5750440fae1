use crate::session::Session;

/// 画面(サブコマンド)に対応するルート。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    UpdatePassword,
    SendReset,
    /// 保存済みのセッションを読まずに削除するため、認証を要求しない。
    Logout,
}

impl Route {
    /// 認証なしで表示できるルートか。
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Route::Login | Route::Register | Route::SendReset | Route::Logout
        )
    }
}

/// ルートガードの判定結果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin,
}

/// セッションがなく、認証不要のルートでもなければログインへ誘導する。
pub fn guard(session: Option<&Session>, route: Route) -> Decision {
    if session.is_some() || route.is_public() {
        Decision::Allow
    } else {
        Decision::RedirectToLogin
    }
}
