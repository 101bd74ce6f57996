use mark_chunker::entity_segment;

/// Canonical form of a ticker: trimmed and upper-cased.
#[must_use]
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Requested entities, normalized and de-duplicated in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    tickers: Vec<String>,
}

impl EntityFilter {
    pub fn new<S: AsRef<str>>(requested: &[S]) -> Self {
        let mut tickers: Vec<String> = Vec::with_capacity(requested.len());
        for raw in requested {
            let ticker = normalize_ticker(raw.as_ref());
            if ticker.is_empty() || tickers.contains(&ticker) {
                continue;
            }
            tickers.push(ticker);
        }
        Self { tickers }
    }

    /// No usable ticker was requested: retrieval is unfiltered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    #[must_use]
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Slot of the requested entity that owns `identifier`, if any.
    ///
    /// Matching is exact on the segment before the first `_`, ignoring case.
    #[must_use]
    pub fn slot_for(&self, identifier: &str) -> Option<usize> {
        let entity = normalize_ticker(entity_segment(identifier));
        self.tickers.iter().position(|ticker| *ticker == entity)
    }
}
