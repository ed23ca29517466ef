mod ingestion;
mod ranking;
