pub mod audit;
pub mod storage;
