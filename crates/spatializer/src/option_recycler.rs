/// Recycling for thingbuf slots holding an `Option`: a recycled slot is just `None`.
#[derive(Default)]
pub(crate) struct OptionRecycler;

impl<T> thingbuf::recycling::Recycle<Option<T>> for OptionRecycler {
    fn new_element(&self) -> Option<T> {
        None
    }

    fn recycle(&self, element: &mut Option<T>) {
        *element = None;
    }
}
