use axum::extract::{FromRef, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use shared::{CredentialsForm, DashboardData, NewGoalForm};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::{AuthService, GoalService};
use crate::error::AppError;
use crate::session::{session_token, CurrentAccount, SessionStore, SESSION_COOKIE};

/// Application state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth: AuthService,
    pub goals: GoalService,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(auth: AuthService, goals: GoalService, sessions: SessionStore) -> Self {
        Self { auth, goals, sessions }
    }
}

/// Build the application router over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/dashboard", get(dashboard))
        .route("/new_goal", post(new_goal))
        .route("/complete_goal/:goal_id", post(complete_goal))
        .route("/logout", get(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - dashboard when logged in, login page otherwise
async fn index(account: Option<CurrentAccount>) -> Redirect {
    match account {
        Some(_) => Redirect::to("/dashboard"),
        None => Redirect::to("/login"),
    }
}

/// GET /login
async fn login_page() -> Html<String> {
    Html(credentials_page("Log in", "/login", "No account yet? <a href=\"/register\">Register</a>"))
}

/// POST /login - authenticate and open a session
async fn login(
    State(auth): State<AuthService>,
    State(sessions): State<SessionStore>,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, AppError> {
    info!("POST /login - child_id: {}", form.child_id);

    auth.login(&form.child_id, &form.password).await?;
    let token = sessions.open(&form.child_id);

    let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to("/dashboard"),
    ))
}

/// GET /register
async fn register_page() -> Html<String> {
    Html(credentials_page("Register", "/register", "Have an account? <a href=\"/login\">Log in</a>"))
}

/// POST /register - create an account, then send the user to the login page
async fn register(
    State(auth): State<AuthService>,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect, AppError> {
    info!("POST /register - child_id: {}", form.child_id);

    auth.register(&form.child_id, &form.password).await?;
    Ok(Redirect::to("/login"))
}

/// GET /dashboard - incomplete goals, full goal list, total stars
async fn dashboard(
    CurrentAccount(child_id): CurrentAccount,
    State(goals): State<GoalService>,
) -> Result<Html<String>, AppError> {
    info!("GET /dashboard - account: {}", child_id);

    let data = goals.dashboard(&child_id).await?;
    Ok(Html(dashboard_page(&data)))
}

/// POST /new_goal - create a goal from the dashboard form
async fn new_goal(
    CurrentAccount(child_id): CurrentAccount,
    State(goals): State<GoalService>,
    Form(form): Form<NewGoalForm>,
) -> Result<Redirect, AppError> {
    info!("POST /new_goal - account: {}, title: {:?}", child_id, form.title);

    goals
        .create_goal(&child_id, &form.title, form.frequency, form.due_date)
        .await?;
    Ok(Redirect::to("/dashboard"))
}

/// POST /complete_goal/:goal_id - mark a goal complete
async fn complete_goal(
    CurrentAccount(child_id): CurrentAccount,
    State(goals): State<GoalService>,
    Path(goal_id): Path<i64>,
) -> Result<Redirect, AppError> {
    info!("POST /complete_goal/{} - account: {}", goal_id, child_id);

    goals.complete_goal(&child_id, goal_id).await?;
    Ok(Redirect::to("/dashboard"))
}

/// GET /logout - unconditionally clear the session
async fn logout(State(sessions): State<SessionStore>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        sessions.close(token);
    }

    let expired = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    ([(header::SET_COOKIE, expired)], Redirect::to("/login"))
}

/// Shared login/register form markup
fn credentials_page(title: &str, action: &str, footer: &str) -> String {
    format!(
        r#"<!doctype html>
<html><head><title>{title} - KidsDash</title></head>
<body>
<h1>{title}</h1>
<form method="post" action="{action}">
  <label>Username <input name="child_id" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">{title}</button>
</form>
<p>{footer}</p>
</body></html>
"#
    )
}

fn dashboard_page(data: &DashboardData) -> String {
    let mut todo_items = String::new();
    for goal in &data.incomplete_goals {
        todo_items.push_str(&format!(
            "<li>{} ({}){}\
             <form method=\"post\" action=\"/complete_goal/{}\"><button>Done</button></form></li>\n",
            escape_html(&goal.title),
            escape_html(&goal.frequency),
            goal.due_date
                .map(|d| format!(" - due {}", d))
                .unwrap_or_default(),
            goal.id,
        ));
    }

    let mut history_rows = String::new();
    for goal in &data.all_goals {
        history_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&goal.title),
            escape_html(&goal.frequency),
            goal.due_date.map(|d| d.to_string()).unwrap_or_default(),
            if goal.completed { "done" } else { "to do" },
            goal.earned_stars,
        ));
    }

    format!(
        r#"<!doctype html>
<html><head><title>Dashboard - KidsDash</title></head>
<body>
<h1>Hi, {child_id}!</h1>
<p>Total stars: {stars}</p>
<h2>Goals to do</h2>
<ul>
{todo_items}</ul>
<h2>New goal</h2>
<form method="post" action="/new_goal">
  <label>Title <input name="title" required></label>
  <label>Frequency <input name="frequency" placeholder="one-time"></label>
  <label>Due date <input name="due_date" type="date"></label>
  <button type="submit">Add goal</button>
</form>
<h2>All goals</h2>
<table>
<tr><th>Title</th><th>Frequency</th><th>Due</th><th>Status</th><th>Stars</th></tr>
{history_rows}</table>
<p><a href="/logout">Log out</a></p>
</body></html>
"#,
        child_id = escape_html(&data.child_id),
        stars = data.total_stars,
        todo_items = todo_items,
        history_rows = history_rows,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
