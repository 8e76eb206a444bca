//! `threadline log` and `threadline topic`: browse the prompt graph.
//!
//! Both print JSON so other tools can consume the listings.

use super::{load_config, open_store};

pub async fn log(
    skip: usize,
    max_count: usize,
    topic: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let prompts = store
        .select_prompts(skip, skip.saturating_add(max_count), topic)
        .await?;
    let logs = prompts
        .iter()
        .map(|p| p.shortlog())
        .collect::<Result<Vec<_>, _>>()?;

    println!("{}", serde_json::to_string_pretty(&logs)?);
    Ok(())
}

pub async fn topics(
    skip: usize,
    max_count: usize,
    include_hidden: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    // Page after filtering so hidden topics don't eat into max_count
    let topics = store.select_topics(0, usize::MAX).await?;
    let mut listed = Vec::new();
    for topic in topics
        .iter()
        .filter(|t| include_hidden || !t.hidden)
        .skip(skip)
        .take(max_count)
    {
        listed.push(serde_json::json!({
            "root_prompt": topic.root.shortlog()?,
            "latest_time": topic.latest_time,
            "hidden": topic.hidden,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&listed)?);
    Ok(())
}
