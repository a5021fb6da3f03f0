/// Token usage accumulated over one realtime connection.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    total_tokens: i32,
    input_tokens: i32,
    output_tokens: i32,
    responses: u32,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, total: i32, input: i32, output: i32) {
        self.total_tokens += total;
        self.input_tokens += input;
        self.output_tokens += output;
        self.responses += 1;
    }

    pub fn total_tokens(&self) -> i32 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> i32 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> i32 {
        self.output_tokens
    }

    pub fn responses(&self) -> u32 {
        self.responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_per_response() {
        let mut stats = Stats::new();
        stats.update_usage(30, 10, 20);
        stats.update_usage(5, 2, 3);
        assert_eq!(stats.total_tokens(), 35);
        assert_eq!(stats.input_tokens(), 12);
        assert_eq!(stats.output_tokens(), 23);
        assert_eq!(stats.responses(), 2);
    }
}
