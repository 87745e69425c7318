use std::fmt::{self, Display, Formatter};

use crate::dispatch::StatsSnapshot;

use super::painter::Painter;
use super::table::Table;

/// Renders the final gateway counters.
pub(crate) struct StatsView<'a> {
    stats: StatsSnapshot,
    painter: &'a Painter,
}

impl<'a> StatsView<'a> {
    pub(crate) fn new(stats: StatsSnapshot, painter: &'a Painter) -> Self {
        Self { stats, painter }
    }
}

impl Display for StatsView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let count = |value: u64, alert: bool| {
            if alert && value > 0 {
                self.painter.warning(value.to_string())
            } else {
                self.painter.value(value.to_string())
            }
        };
        let table = Table::key_value(
            self.painter,
            vec![
                ("total", count(self.stats.total, false)),
                ("valid", count(self.stats.valid, false)),
                ("errors", count(self.stats.errors, true)),
                ("published", count(self.stats.published, false)),
                ("dropped", count(self.stats.dropped, true)),
            ],
        );
        write!(f, "{}", self.painter.heading("Gateway stats:"))?;
        write!(f, "\n{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn stats_view_lists_every_counter() {
        let painter = Painter::new(false);
        let stats = StatsSnapshot {
            total: 12,
            valid: 10,
            errors: 2,
            published: 10,
            dropped: 0,
        };
        assert_snapshot!(StatsView::new(stats, &painter).to_string(), @r"
        Gateway stats:
        ╭───────────┬───────╮
        │ field     │ value │
        ├───────────┼───────┤
        │ total     │ 12    │
        │ valid     │ 10    │
        │ errors    │ 2     │
        │ published │ 10    │
        │ dropped   │ 0     │
        ╰───────────┴───────╯
        ");
    }
}
