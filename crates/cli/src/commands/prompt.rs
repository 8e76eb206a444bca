//! `threadline prompt`: send a request and stream the answer.

use super::{load_config, open_store};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use threadline_assistant::{Assistant, MakePrompt};

pub struct PromptArgs {
    pub text: String,
    pub parent: Option<String>,
    pub references: Vec<String>,
    pub instruct: Vec<PathBuf>,
    pub context: Vec<PathBuf>,
    pub function_name: Option<String>,
}

async fn read_all(paths: &[PathBuf]) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        contents.push(text);
    }
    Ok(contents)
}

pub async fn run(args: PromptArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let chat = threadline_providers::build_from_config(&config)?;
    let store = Arc::new(open_store(&config).await?);

    let request = MakePrompt {
        request: args.text,
        instruct: read_all(&args.instruct).await?,
        context: read_all(&args.context).await?,
        parent: args.parent,
        references: args.references,
        function_name: args.function_name,
    };

    let mut assistant = Assistant::new(chat, store, config.token_limit);
    assistant.make_prompt(request).await?;

    let mut stdout = std::io::stdout();
    let mut stream = assistant.iterate_response();
    while let Some(chunk) = stream.next().await {
        write!(stdout, "{}", chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
