//! Plans command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore, name: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        match store.get_plan(name)? {
            Some(plan) => {
                println!("# {}", plan.title.as_deref().unwrap_or(&plan.name));
                if let Some(content) = &plan.content {
                    println!("\n{}", content);
                }
            }
            None => println!("Plan '{}' not found.", name),
        }
        return Ok(());
    }

    let plans = store.list_plans()?;
    if plans.is_empty() {
        println!("No plans found.");
        return Ok(());
    }

    println!("{:<24} {:<40} {}", "Name", "Title", "Imported");
    println!("{}", "-".repeat(80));
    for plan in plans {
        println!(
            "{:<24} {:<40} {}",
            plan.name,
            plan.title.as_deref().unwrap_or("-"),
            plan.created_at.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
