pub mod answer;
pub mod check;
pub mod init;
