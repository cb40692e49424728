pub mod dashboard;
pub mod feeds;
pub mod notes;
pub mod push;
pub mod supplies;
pub mod tasks;
pub mod timetable;
