pub mod product_chats;
pub mod products;
pub mod users;
