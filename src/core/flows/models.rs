use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// Output of the `faq` flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqOutput {
    pub faqs: Vec<Faq>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub title: String,
    #[serde(rename = "shortDescription")]
    pub short_description: String,
}

/// Output of the `trending-topics` flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTopicsOutput {
    pub topics: Vec<TrendingTopic>,
}
