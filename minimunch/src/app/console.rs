use super::*;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{
    wrappers::{LinesStream, WatchStream},
    StreamExt,
};

const HELP: &str = "Commands: weight on|off, proximity on|off, activate, deactivate, help, quit";

/// A line typed by the user.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Toggle(Field, bool),
    Activate,
    Deactivate,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            [field, state] => {
                let field = match *field {
                    "weight" | "peso" | "porpeso" => Field::WeightSensor,
                    "proximity" | "prox" | "porprox" => Field::ProximitySensor,
                    other => return Err(anyhow!("Unknown sensor '{}'", other)),
                };
                let enabled = match *state {
                    "on" | "1" => true,
                    "off" | "0" => false,
                    other => return Err(anyhow!("Expected on or off, got '{}'", other)),
                };
                Ok(Command::Toggle(field, enabled))
            }
            ["activate"] | ["activar"] => Ok(Command::Activate),
            ["deactivate"] | ["desactivar"] => Ok(Command::Deactivate),
            ["help"] | ["?"] => Ok(Command::Help),
            ["quit"] | ["exit"] => Ok(Command::Quit),
            _ => Err(anyhow!("Unrecognized command '{}'", line.trim())),
        }
    }
}

impl Command {
    fn dispatch(&self, view: &DeviceStatusView) {
        match self {
            Command::Toggle(field, enabled) => {
                view.toggle_flag(*field, *enabled);
            }
            Command::Activate => {
                view.set_manual_action(Labels::ACTIVATED);
            }
            Command::Deactivate => {
                view.set_manual_action(Labels::DEACTIVATED);
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => (),
        }
    }
}

/// Renders the screen on every change and feeds stdin commands to the view
/// until quit, end of input or Ctrl-C.
pub async fn run(view: &DeviceStatusView) -> Result<()> {
    let mut screens = WatchStream::new(view.watch());
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    println!("{}", HELP);
    loop {
        tokio::select! {
            Some(state) = screens.next() => println!("\n{}", StatusScreen::from(&state)),
            line = lines.next() => match line {
                Some(line) => match line?.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => command.dispatch(view),
                    Err(e) => warn!("{}", e),
                },
                None => {
                    debug!("Input closed");
                    break;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                warn!("Signal received, shutting down");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;

    #[test]
    fn parses_switch_commands() {
        assert_eq!(
            "weight on".parse::<Command>().unwrap(),
            Command::Toggle(Field::WeightSensor, true)
        );
        assert_eq!(
            "  Prox   OFF ".parse::<Command>().unwrap(),
            Command::Toggle(Field::ProximitySensor, false)
        );
        assert_eq!(
            "porpeso 0".parse::<Command>().unwrap(),
            Command::Toggle(Field::WeightSensor, false)
        );
    }

    #[test]
    fn parses_actions() {
        assert_eq!("activate".parse::<Command>().unwrap(), Command::Activate);
        assert_eq!("Desactivar".parse::<Command>().unwrap(), Command::Deactivate);
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!("?".parse::<Command>().unwrap(), Command::Help);
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Command>().is_err());
        assert!("weight maybe".parse::<Command>().is_err());
        assert!("lights on".parse::<Command>().is_err());
        assert!("activate now".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn activate_writes_prefixed_label() {
        let store = MemoryStore::new();
        let view = DeviceStatusView::mount(Arc::new(store.clone()), &Default::default())
            .await
            .unwrap();
        Command::Activate.dispatch(&view);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            store.get("dispensador/status/last_action"),
            Some(serde_json::json!("Dispensador Activado"))
        );
    }
}
