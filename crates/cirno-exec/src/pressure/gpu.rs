//! GPU memory, read from `nvidia-smi`.
use std::process::Command;

use crate::ExecError;

const QUERY: &str = "--query-gpu=index,gpu_name,memory.total,memory.free,memory.used";
const FORMAT: &str = "--format=csv,noheader,nounits";

/// One card as reported by `nvidia-smi`, memory in MiB.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuCard {
    pub index: u32,
    pub name: String,
    pub memory_total: f64,
    pub memory_free: f64,
    pub memory_used: f64,
}

impl GpuCard {
    /// Share of the card's memory that is free.
    pub fn free_ratio(&self) -> f64 {
        if self.memory_total > 0.0 {
            self.memory_free / self.memory_total
        } else {
            0.0
        }
    }
}

/// Query every NVIDIA card on the host.
pub fn query_nvidia() -> Result<Vec<GpuCard>, ExecError> {
    let output = Command::new("nvidia-smi").args([QUERY, FORMAT]).output()?;
    if !output.status.success() {
        return Err(ExecError::Gpu(format!(
            "nvidia-smi exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_cards(&String::from_utf8_lossy(&output.stdout))
}

/// `true` when some card has at least `ratio` of its memory free.
pub fn has_free_card(cards: &[GpuCard], ratio: f64) -> bool {
    cards.iter().any(|card| card.free_ratio() >= ratio)
}

/// Parse `index, name, total, free, used` lines.
pub(crate) fn parse_cards(csv: &str) -> Result<Vec<GpuCard>, ExecError> {
    csv.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_card)
        .collect()
}

fn parse_card(line: &str) -> Result<GpuCard, ExecError> {
    let bad = || ExecError::Gpu(format!("unexpected nvidia-smi line '{line}'"));
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [index, name, total, free, used] = fields.as_slice() else {
        return Err(bad());
    };
    let mib = |field: &str| field.parse::<f64>().map_err(|_| bad());
    Ok(GpuCard {
        index: index.parse().map_err(|_| bad())?,
        name: name.to_string(),
        memory_total: mib(total)?,
        memory_free: mib(free)?,
        memory_used: mib(used)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
0, NVIDIA A100-SXM4-40GB, 40960, 2048, 38912
1, NVIDIA A100-SXM4-40GB, 40960, 30720, 10240
";

    #[test]
    fn parses_every_card() {
        let cards = parse_cards(SAMPLE).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].index, 1);
        assert_eq!(cards[1].name, "NVIDIA A100-SXM4-40GB");
        assert_eq!(cards[1].free_ratio(), 0.75);
    }

    #[test]
    fn free_card_needs_the_ratio() {
        let cards = parse_cards(SAMPLE).unwrap();
        assert!(has_free_card(&cards, 0.5));
        assert!(!has_free_card(&cards, 0.8));
        assert!(!has_free_card(&[], 0.0));
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse_cards("0, A100, 40960").is_err());
        assert!(parse_cards("x, A100, 1, 1, 0").is_err());
        assert!(parse_cards("0, A100, lots, 1, 0").is_err());
        assert!(parse_cards("\n\n").unwrap().is_empty());
    }

    #[test]
    fn empty_card_is_never_free() {
        let card = GpuCard {
            index: 0,
            name: "broken".into(),
            memory_total: 0.0,
            memory_free: 0.0,
            memory_used: 0.0,
        };
        assert_eq!(card.free_ratio(), 0.0);
        assert!(!has_free_card(&[card], 0.1));
    }
}
