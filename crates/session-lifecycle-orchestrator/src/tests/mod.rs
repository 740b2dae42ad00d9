
mod login;
mod profile;
