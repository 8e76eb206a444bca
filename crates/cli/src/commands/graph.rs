//! `threadline delete` and `threadline hide`: edit the prompt graph.

use super::{load_config, open_store};

pub async fn delete(hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    if store.delete_prompt(hash).await? {
        println!("Deleted prompt {hash}");
    } else {
        return Err(format!(
            "Prompt {hash} has children or is referenced by another prompt; not deleted"
        )
        .into());
    }
    Ok(())
}

pub async fn hide(hash: &str, hidden: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    store.set_topic_hidden(hash, hidden).await?;
    if hidden {
        println!("Topic {hash} hidden");
    } else {
        println!("Topic {hash} visible");
    }
    Ok(())
}
