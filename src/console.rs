//! Line-oriented console for `kingpin play`.
//!
//! [`parse`] turns one input line into a [`ConsoleCommand`]; the `render_*`
//! helpers turn mirror state into plain text. Neither touches the gateway.

use log::trace;
use std::collections::BTreeMap;

use crate::game::coords::{self, MAP_SIZE};
use crate::game::sync::Catalog;
use crate::game::types::{AssetId, GridPosition, PlayerSnapshot, TokenAmount};

pub const HELP_TEXT: &str = "\
Commands:
  register              mint-gated player registration
  move <id>             move to district 0-7
  goto <x> <y>          move to the district on a map cell
  buy <asset> <n>       authorize payment, then buy
  sell <asset> <n>      sell from inventory
  quote <asset> <n>     price check, nothing is submitted
  restore               refill action points
  map | market | status | messages
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Register,
    Move(u32),
    Goto(GridPosition),
    Buy { asset: AssetId, amount: u64 },
    Sell { asset: AssetId, amount: u64 },
    Quote { asset: AssetId, amount: u64 },
    Restore,
    Map,
    Market,
    Status,
    Messages,
    Quit,
    Empty,
    Unknown(String),
    Invalid(String),
}

pub fn parse(line: &str) -> ConsoleCommand {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return ConsoleCommand::Empty;
    };
    let args: Vec<&str> = words.collect();
    let cmd = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => no_args(ConsoleCommand::Help, &args),
        "register" => no_args(ConsoleCommand::Register, &args),
        "restore" => no_args(ConsoleCommand::Restore, &args),
        "map" => no_args(ConsoleCommand::Map, &args),
        "market" => no_args(ConsoleCommand::Market, &args),
        "status" => no_args(ConsoleCommand::Status, &args),
        "messages" | "log" => no_args(ConsoleCommand::Messages, &args),
        "quit" | "exit" | "q" => no_args(ConsoleCommand::Quit, &args),
        "move" => match args.as_slice() {
            [id] => number(id, "district id")
                .map_or_else(ConsoleCommand::Invalid, ConsoleCommand::Move),
            _ => ConsoleCommand::Invalid("usage: move <id>".into()),
        },
        "goto" => match args.as_slice() {
            [x, y] => match (number::<u8>(x, "x"), number::<u8>(y, "y")) {
                (Ok(x), Ok(y)) => ConsoleCommand::Goto(GridPosition::new(x, y)),
                (Err(e), _) | (_, Err(e)) => ConsoleCommand::Invalid(e),
            },
            _ => ConsoleCommand::Invalid("usage: goto <x> <y>".into()),
        },
        "buy" | "sell" | "quote" => match args.as_slice() {
            [asset, amount] => match (number(asset, "asset id"), number(amount, "amount")) {
                (Ok(asset), Ok(amount)) => match head.to_ascii_lowercase().as_str() {
                    "buy" => ConsoleCommand::Buy { asset, amount },
                    "sell" => ConsoleCommand::Sell { asset, amount },
                    _ => ConsoleCommand::Quote { asset, amount },
                },
                (Err(e), _) | (_, Err(e)) => ConsoleCommand::Invalid(e),
            },
            _ => ConsoleCommand::Invalid(format!("usage: {} <asset> <amount>", head)),
        },
        _ => ConsoleCommand::Unknown(head.to_string()),
    };
    trace!("parsed {:?} from '{}'", cmd, line);
    cmd
}

fn no_args(cmd: ConsoleCommand, args: &[&str]) -> ConsoleCommand {
    if args.is_empty() {
        cmd
    } else {
        ConsoleCommand::Invalid(format!("unexpected argument '{}'", args[0]))
    }
}

fn number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{} must be a non-negative number, got '{}'", what, raw))
}

/// ASCII grid: districts by id digit, `@` for the player, `.` for empty cells.
pub fn render_map(player: Option<GridPosition>) -> String {
    let mut out = String::from("   ");
    for x in 0..MAP_SIZE {
        out.push_str(&format!("{} ", x));
    }
    out.push('\n');
    for (y, row) in coords::render_rows(player).iter().enumerate() {
        out.push_str(&format!("{:>2} ", y));
        for cell in row {
            let glyph = match (cell.has_player, cell.district) {
                (true, _) => '@',
                (false, Some(d)) => char::from(b'0' + d.id()),
                (false, None) => '.',
            };
            out.push(glyph);
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

/// One line per asset with the current local price (when known) and holding.
pub fn render_market(
    catalog: &Catalog,
    snapshot: Option<&PlayerSnapshot>,
    prices: &BTreeMap<AssetId, TokenAmount>,
) -> String {
    let mut out = String::new();
    for asset in &catalog.assets {
        let price = prices
            .get(&asset.id)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        let held = snapshot.map(|s| s.quantity(asset.id)).unwrap_or(0);
        out.push_str(&format!(
            "[{}] {:<18} price {:>6}  held {:>4}{}\n",
            asset.id,
            asset.name,
            price,
            held,
            if asset.is_contraband { "  (contraband)" } else { "" }
        ));
    }
    out
}

pub fn render_player(
    catalog: Option<&Catalog>,
    snapshot: &PlayerSnapshot,
    position: GridPosition,
) -> String {
    let district = match catalog {
        Some(c) => c.district_name(snapshot.current_district),
        None => snapshot.current_district.label().to_string(),
    };
    let mut out = format!(
        "District: {} {}\nAction points: {}\n",
        district, position, snapshot.action_points
    );
    let holdings: Vec<String> = snapshot
        .holdings()
        .map(|(id, qty)| {
            let name = catalog
                .map(|c| c.asset_name(id))
                .unwrap_or_else(|| format!("asset #{}", id));
            format!("{} x{}", name, qty)
        })
        .collect();
    if holdings.is_empty() {
        out.push_str("Inventory: empty\n");
    } else {
        out.push_str(&format!("Inventory: {}\n", holdings.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{AssetDefinition, District};

    #[test]
    fn parses_trading_commands() {
        assert_eq!(parse("buy 0 3"), ConsoleCommand::Buy { asset: 0, amount: 3 });
        assert_eq!(parse("  SELL 2 1 "), ConsoleCommand::Sell { asset: 2, amount: 1 });
        assert_eq!(parse("quote 1 10"), ConsoleCommand::Quote { asset: 1, amount: 10 });
        assert!(matches!(parse("buy 0"), ConsoleCommand::Invalid(_)));
        assert!(matches!(parse("buy zero 3"), ConsoleCommand::Invalid(_)));
    }

    #[test]
    fn parses_movement() {
        assert_eq!(parse("move 2"), ConsoleCommand::Move(2));
        // Range is checked by the client, not the parser.
        assert_eq!(parse("move 9"), ConsoleCommand::Move(9));
        assert_eq!(parse("goto 8 8"), ConsoleCommand::Goto(GridPosition::new(8, 8)));
        assert!(matches!(parse("goto 1"), ConsoleCommand::Invalid(_)));
        assert!(matches!(parse("move -1"), ConsoleCommand::Invalid(_)));
    }

    #[test]
    fn parses_bare_words() {
        assert_eq!(parse(""), ConsoleCommand::Empty);
        assert_eq!(parse("quit"), ConsoleCommand::Quit);
        assert_eq!(parse("Map"), ConsoleCommand::Map);
        assert!(matches!(parse("restore now"), ConsoleCommand::Invalid(_)));
        assert_eq!(parse("dance"), ConsoleCommand::Unknown("dance".into()));
    }

    #[test]
    fn map_marks_player_and_districts() {
        let text = render_map(Some(GridPosition::new(8, 8)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + MAP_SIZE as usize);
        // Row 8: Outskirts (7) at x=1, player on Black Market at x=8.
        let row8: Vec<&str> = lines[9].split_whitespace().collect();
        assert_eq!(row8[0], "8");
        assert_eq!(row8[2], "7");
        assert_eq!(row8[9], "@");
    }

    #[test]
    fn market_lists_prices_and_holdings() {
        let catalog = Catalog {
            assets: vec![AssetDefinition {
                id: 0,
                name: "GPU Rigs".into(),
                base_price: 10,
                volatility: 3,
                is_contraband: false,
            }],
            districts: Vec::new(),
        };
        let mut inventory = BTreeMap::new();
        inventory.insert(0, 3);
        let snap = PlayerSnapshot {
            current_district: District::BlackMarket,
            action_points: 1,
            inventory,
        };
        let mut prices = BTreeMap::new();
        prices.insert(0, 10);
        let text = render_market(&catalog, Some(&snap), &prices);
        assert!(text.contains("GPU Rigs"));
        assert!(text.contains("price     10"));
        assert!(text.contains("held    3"));

        let player = render_player(Some(&catalog), &snap, GridPosition::new(8, 8));
        assert!(player.contains("BLACK_MARKET (8, 8)"));
        assert!(player.contains("GPU Rigs x3"));
    }
}
