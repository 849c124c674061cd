mod handler;
pub mod model;

pub use handler::{
    create_community,
    find_by_id,
    find_nearby,
    get_members,
    join_community,
    leave_community,
    list_communities,
};
