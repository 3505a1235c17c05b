use std::fmt;

mod engine;

pub use engine::FilterPipeline;

/// One step of the linear filter chain, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Unfiltered base query
    Base,
    /// Base restricted to the selected time interval
    Time,
    /// Time stage restricted to the selected area
    Geo,
    /// Geo stage restricted to the selected groups
    Grouping,
    /// Grouping stage restricted by the full-text search; the final result
    FullText,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Base,
        Stage::Time,
        Stage::Geo,
        Stage::Grouping,
        Stage::FullText,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// This stage and every stage after it
    pub fn downstream(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().filter(move |stage| *stage >= self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Base => "base",
            Stage::Time => "time",
            Stage::Geo => "geo",
            Stage::Grouping => "grouping",
            Stage::FullText => "full-text",
        };
        f.write_str(name)
    }
}
