pub mod add;
pub mod cards;
pub mod counts;
pub mod decks;
pub mod filtered;
pub mod init;
pub mod options;
pub mod study;
pub mod upgrade;
