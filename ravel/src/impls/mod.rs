mod container;
mod foreign;
mod primitive;
