use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 10] = [
    "type",
    "card",
    "pay",
    "arrival",
    "reserve",
    "entitlement",
    "quantity",
    "start",
    "end",
    "at",
];

/// Writes an event log where every card is a 7-use card consumed as 3 then 4 units.
pub fn generate_card_log(path: &Path, cards: u64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    for card in 1..=cards {
        let id = card.to_string();
        wtr.write_record(["issue_count", &id, "9", "8.98", "0.3", "7", "", "", "", ""])?;
    }
    for quantity in ["3", "4"] {
        for card in 1..=cards {
            let id = card.to_string();
            wtr.write_record(["consume", &id, "", "", "", "", quantity, "", "", ""])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
