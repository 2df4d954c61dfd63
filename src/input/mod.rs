use crate::app::events::{Event, InputEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Reads commands line by line from stdin until it closes or the app goes away.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("stdin: {e}");
                    break;
                }
            };
            let Some(ev) = map_line(&line) else {
                if !line.trim().is_empty() {
                    println!("commands: n (next video), r (retry search), q (quit)");
                }
                continue;
            };
            if tx.send(Event::Input(ev)).await.is_err() {
                break;
            }
        }
    });
}

pub fn map_line(line: &str) -> Option<InputEvent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" | "s" | "skip" => Some(InputEvent::Skip),
        "r" | "retry" => Some(InputEvent::Retry),
        "q" | "quit" | "exit" => Some(InputEvent::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_line() {
        assert_eq!(map_line("n"), Some(InputEvent::Skip));
        assert_eq!(map_line("  Skip \n"), Some(InputEvent::Skip));
        assert_eq!(map_line("r"), Some(InputEvent::Retry));
        assert_eq!(map_line("Q"), Some(InputEvent::Quit));
        assert_eq!(map_line(""), None);
        assert_eq!(map_line("play"), None);
    }
}
