//! Building list and broker application.

use anyhow::Result;

use broker_apply::{ApplyError, Field, SubmitOutcome};

use super::context::Context;

pub struct ApplyInput {
    pub real_name: String,
    pub phone: String,
    pub building_id: i64,
    pub company_name: String,
    pub license_no: String,
}

fn fail(e: ApplyError) -> anyhow::Error {
    let (title, body) = e.user_message();
    anyhow::anyhow!("{}: {}", title, body)
}

pub async fn buildings(ctx: &Context, json_output: bool) -> Result<()> {
    let count = ctx.apply.load_buildings().await.map_err(fail)?;
    let picker = ctx.apply.picker();

    if json_output {
        let out: Vec<_> = picker
            .districts()
            .iter()
            .map(|d| serde_json::json!({"district": d.name, "buildings": d.buildings}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if count == 0 {
        println!("No buildings open for application.");
        return Ok(());
    }
    for district in picker.districts() {
        println!("{}", district.name);
        for b in &district.buildings {
            println!("  {:<6} {}", b.id, b.display_name());
        }
    }
    Ok(())
}

pub async fn apply(ctx: &Context, input: ApplyInput) -> Result<()> {
    ctx.apply.load_buildings().await.map_err(fail)?;

    let district = ctx
        .apply
        .picker()
        .districts()
        .iter()
        .find(|d| d.buildings.iter().any(|b| b.id == input.building_id))
        .map(|d| d.name.clone());
    let Some(district) = district else {
        anyhow::bail!("Unknown building {}. Run `broker buildings`.", input.building_id);
    };
    ctx.apply.open_picker();
    ctx.apply.select_district(&district);
    ctx.apply.select_building(input.building_id);
    let building = ctx.apply.confirm_building().map_err(fail)?;

    ctx.apply.set_field(Field::RealName, input.real_name);
    ctx.apply.set_field(Field::Phone, input.phone);
    ctx.apply.set_field(Field::CompanyName, input.company_name);
    ctx.apply.set_field(Field::LicenseNo, input.license_no);

    match ctx.apply.submit().await.map_err(fail)? {
        SubmitOutcome::Submitted { message } => {
            println!(
                "Application for {} submitted. {}",
                building.display_name(),
                message.unwrap_or_else(|| "申请提交成功".into())
            );
        }
        SubmitOutcome::Ignored => {
            anyhow::bail!("Fill in name, phone and building before submitting.");
        }
    }
    Ok(())
}
