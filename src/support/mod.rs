pub mod client_ip;
pub mod html;
pub mod password;
