use akiclient::{
    ClientConfig, ClientError, Game, GameOptions, GameSession, StepOutcome, ThemeRegistry,
    Transport,
};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        println!("{:?}", e);
        println!(".env file missing, using env variables")
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    let transport = Transport::new(&config)?;
    let mut registry = ThemeRegistry::new(transport.clone());

    let mut game =
        GameSession::start(transport, &mut registry, &GameOptions::from_config(&config)).await?;
    tracing::info!("Playing with the {} protocol", game);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if let Some(guess) = game.answer().cloned() {
            println!("Is it {} ({})? [y/n]", guess.name, guess.description);

            match next_line(&mut lines).await?.as_deref() {
                Some("y") => {
                    game.accept_answer().await?;
                    println!("Great, thanks for playing!");
                    return Ok(());
                }
                Some(_) => {
                    if let Err(err) = game.decline_answer().await {
                        report(err)?;
                    }
                    continue;
                }
                None => return Ok(()),
            }
        }

        println!("[{:.1}%] {}", game.progress(), game.question());
        for (i, option) in game.options().iter().enumerate() {
            println!("  {i}) {option}");
        }
        println!("  u) undo  g) best guess");

        let Some(input) = next_line(&mut lines).await? else {
            return Ok(());
        };

        let result = match input.as_str() {
            "u" => game.undo().await,
            "g" => match game.guess().await {
                Ok(guess) => {
                    println!("Best guess: {} ({:.2}%)", guess.name, guess.probability);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            other => match other.parse::<usize>() {
                Ok(index) => game.select_option(index).await.map(|outcome| {
                    if let StepOutcome::AnswerFound(guess) = outcome {
                        tracing::debug!("Reached a proposition: {}", guess.name);
                    }
                }),
                Err(_) => {
                    println!("Unknown input `{other}`");
                    Ok(())
                }
            },
        };

        if let Err(err) = result {
            report(err)?;
        }
    }
}

async fn next_line(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Option<String>> {
    Ok(lines.next_line().await?.map(|line| line.trim().to_lowercase()))
}

/// Prints errors the session can survive and bails on the rest.
fn report(err: ClientError) -> anyhow::Result<()> {
    match err {
        ClientError::NoGuess => {
            println!("No guesses yet, keep answering");
            Ok(())
        }
        ClientError::State { .. } => {
            println!("{err}");
            Ok(())
        }
        err if err.is_recoverable() => {
            tracing::warn!("{err}");
            Ok(())
        }
        err => Err(err.into()),
    }
}
