//! Login / session commands.

use std::path::Path;

use anyhow::Result;

use broker_app::{ProfileView, navigate_home};
use broker_auth::{AuthError, LoginPath};

use super::context::Context;

fn fail(e: AuthError) -> anyhow::Error {
    let (title, body) = e.user_message();
    anyhow::anyhow!("{}: {} ({})", title, body, e)
}

pub async fn login(ctx: &Context, need_profile: bool, json_output: bool) -> Result<()> {
    let outcome = ctx.login.login(need_profile).await.map_err(fail)?;
    navigate_home(ctx.nav.as_ref());

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": format!("{:?}", outcome.path),
                "token": outcome.token,
                "userInfo": outcome.user_info,
            }))?
        );
        return Ok(());
    }
    match outcome.path {
        LoginPath::Existing => println!("Already logged in."),
        LoginPath::Verified => println!("Logged in."),
        LoginPath::Fallback => println!("Backend unreachable; logged in with a local development session."),
    }
    if let Some(user) = &outcome.user_info {
        let view = ProfileView::new(user, ctx.session.last_login_time(), chrono::Utc::now());
        println!("  user:   {} ({})", view.nick_name, view.user_tag);
    }
    Ok(())
}

pub async fn logout(ctx: &Context) {
    ctx.session.logout().await;
    println!("Logged out.");
}

pub async fn status(ctx: &Context, json_output: bool) -> Result<()> {
    let decision = ctx.launcher.on_launch().await;
    let snapshot = ctx.app.snapshot();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!("server:   {}", ctx.config.server);
    if !snapshot.is_logged_in {
        println!("status:   logged out ({:?})", decision);
        return Ok(());
    }
    println!("status:   logged in");
    if let Some(user) = &snapshot.user_info {
        let view = ProfileView::new(user, ctx.session.last_login_time(), chrono::Utc::now());
        println!("nickname: {}", view.nick_name);
        println!("type:     {} / {}", view.user_tag, view.login_type_text);
        println!("gender:   {}", view.gender_text);
        println!("location: {}", view.location_text);
        if let Some(phone) = &view.phone_number {
            println!("phone:    {}", phone);
        }
        if !view.last_login_text.is_empty() {
            println!("login:    {}", view.last_login_text);
        }
        println!("ids:      {}", user.identity_fields());
    }
    Ok(())
}

pub async fn check(ctx: &Context) {
    if ctx.session.check_validity().await {
        println!("Session valid.");
    } else {
        println!("No valid session.");
    }
}

pub async fn refresh(ctx: &Context) -> Result<()> {
    ctx.session.refresh().await.map_err(fail)?;
    println!("Token refreshed.");
    Ok(())
}

pub async fn profile(ctx: &Context, patch: serde_json::Value, json_output: bool) -> Result<()> {
    let user = ctx.session.sync_profile(patch).await.map_err(fail)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        let view = ProfileView::new(&user, ctx.session.last_login_time(), chrono::Utc::now());
        println!("Profile updated: {} / {}", view.nick_name, view.location_text);
    }
    Ok(())
}

pub async fn avatar(ctx: &Context, file: &Path) -> Result<()> {
    let url = ctx.session.upload_avatar(file).await.map_err(fail)?;
    println!("Avatar updated: {}", url);
    Ok(())
}
