mod listener;
mod storage;
