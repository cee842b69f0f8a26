use std::env;

use minesweeper_client::{FieldEvent, FieldModel, FieldSession, FieldState, TileState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let field_id = env::args().nth(1).unwrap_or_else(|| "lobby".to_owned());
    let session = FieldSession::from_env()?;
    let mut events = session.subscribe_to_events().await;

    session.connect(&field_id).await?;
    println!("Watching field {field_id}");

    while let Some(event) = events.recv().await {
        match event {
            FieldEvent::Initialized { size, mines } | FieldEvent::NewGame { size, mines } => {
                println!("\n🎮 {size}x{size} with {mines} mines");
            }
            FieldEvent::TilesChanged { positions } => {
                println!("\n📋 {} tiles changed", positions.len());
            }
            FieldEvent::StateChanged { to, .. } => match to {
                FieldState::Won => println!("🎉 Field cleared!"),
                FieldState::Lost => println!("💣 Boom!"),
                FieldState::Running => {}
            },
            FieldEvent::ConnectionLost => {
                println!("🔌 Connection lost!");
                break;
            }
        }

        session.with_field(display_field).await;
    }

    session.disconnect().await?;
    Ok(())
}

fn display_field(field: &FieldModel) {
    println!(
        "mines left: {}  time: {}s  last move by: {}",
        field.mines_left(),
        field.game_seconds(),
        field.recent_player()
    );
    for row in field.rows() {
        let line: String = row
            .iter()
            .map(|tile| match tile.state {
                TileState::Hidden => '■',
                TileState::Revealed if tile.mines_close == 0 => ' ',
                TileState::Revealed => char::from_digit(tile.mines_close, 10).unwrap_or('?'),
                TileState::Mark => '⚑',
                TileState::Mine => '*',
                TileState::FalseMark => 'x',
            })
            .collect();
        println!("{line}");
    }
}
