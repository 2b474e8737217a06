/// Chunk of items pushed from an actor to the replay buffer.
#[derive(Debug)]
pub struct PushedItemMessage<T> {
    /// ID of the actor.
    pub id: usize,

    /// Items in the order the actor produced them.
    pub pushed_items: Vec<T>,
}
