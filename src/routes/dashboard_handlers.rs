use axum::{
    debug_handler,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::fmt::Write;
use tracing::error;

use crate::{
    auth::Session,
    models::{ConnectedAccountSummary, UpcomingPost, User},
    state::AppState,
};

const UPCOMING_LIMIT: i64 = 10;

/// What the dashboard shows beyond the session id
struct LocalData {
    user: User,
    accounts: Vec<ConnectedAccountSummary>,
    upcoming: Vec<UpcomingPost>,
}

async fn load_local_data(state: &AppState, user_id: &str) -> Result<Option<LocalData>, sqlx::Error> {
    let Some(user) = state.repository.find_user(user_id).await? else {
        return Ok(None);
    };
    let accounts = state.repository.connected_accounts(user_id).await?;
    let upcoming = state
        .repository
        .upcoming_posts(user_id, UPCOMING_LIMIT)
        .await?;

    Ok(Some(LocalData {
        user,
        accounts,
        upcoming,
    }))
}

/// GET /dashboard
#[debug_handler]
pub async fn dashboard(State(state): State<AppState>, session: Option<Session>) -> Response {
    let Some(session) = session else {
        return Redirect::temporary(&state.sign_in_url).into_response();
    };

    let local = match load_local_data(&state, &session.user_id).await {
        Ok(local) => local,
        Err(err) => {
            error!(user_id = %session.user_id, error = ?err, "Failed to load dashboard data");
            None
        }
    };

    Html(render_dashboard(&session.user_id, local.as_ref())).into_response()
}

fn render_dashboard(user_id: &str, local: Option<&LocalData>) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Dashboard</title></head>\n<body>\n",
    );
    page.push_str(
        "<header style=\"display: flex; justify-content: space-between; padding: 1rem\">\
         <h1>Dashboard</h1></header>\n<main style=\"padding: 1rem\">\n",
    );
    let _ = writeln!(
        page,
        "<p>Welcome to your dashboard! Your User ID is: {}</p>",
        escape_html(user_id)
    );

    if let Some(local) = local {
        let status = local
            .user
            .subscription_status
            .map(|s| s.as_str())
            .unwrap_or("none");
        let _ = writeln!(
            page,
            "<p>Email: {}</p>\n<p>Plan: {}</p>",
            escape_html(&local.user.email),
            status
        );

        page.push_str("<h2>Connected accounts</h2>\n");
        if local.accounts.is_empty() {
            page.push_str("<p>No accounts connected yet.</p>\n");
        } else {
            page.push_str("<ul>\n");
            for account in &local.accounts {
                let _ = writeln!(
                    page,
                    "<li>{} ({})</li>",
                    escape_html(&account.platform_name),
                    escape_html(account.username_on_platform.as_deref().unwrap_or("unknown"))
                );
            }
            page.push_str("</ul>\n");
        }

        page.push_str("<h2>Upcoming posts</h2>\n");
        if local.upcoming.is_empty() {
            page.push_str("<p>Nothing scheduled.</p>\n");
        } else {
            page.push_str("<ul>\n");
            for post in &local.upcoming {
                let _ = writeln!(
                    page,
                    "<li>{} &middot; {} on {} ({})</li>",
                    post.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                    escape_html(post.title.as_deref().unwrap_or("Untitled")),
                    escape_html(&post.platform_name),
                    post.content_type.as_str()
                );
            }
            page.push_str("</ul>\n");
        }
    }

    page.push_str("</main>\n</body>\n</html>\n");
    page
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
