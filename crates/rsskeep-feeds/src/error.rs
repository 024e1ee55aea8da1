use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {feed} ({category}) failed: {source}")]
    Request {
        feed: String,
        category: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {feed} ({category})")]
    Status {
        feed: String,
        category: String,
        status: u16,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
}
